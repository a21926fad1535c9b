//! `ordercheck run` and `ordercheck normalize`.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Args;
use ordercheck_provider::{DetailPolicy, OrderFilter, ProviderClient, ProviderError};
use ordercheck_recon::report::format_money;
use ordercheck_recon::{
    build, ledger_table, normalize, reconcile_with_unfetched, to_json,
    LedgerOrder, ProviderOrder, ReconciliationReport, Table,
};
use rust_decimal::Decimal;

use crate::cancel;
use crate::config::{resolve_api_key, AppConfig, Overrides, API_KEY_ENV};
use crate::exit_codes::EXIT_DISCREPANCIES;
use crate::ledger_io::read_ledger;
use crate::CliError;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Ledger export (.csv, .tsv, .xlsx, .xls, .ods)
    #[arg(long, short = 'l')]
    pub ledger: PathBuf,

    /// Config file (default: ./ordercheck.toml when present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Provider API key (default: $ORDERCHECK_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Only provider orders created on or after this date
    #[arg(long, value_name = "YYYY-MM-DD", requires = "to")]
    pub from: Option<NaiveDate>,

    /// Only provider orders created on or before this date
    #[arg(long, value_name = "YYYY-MM-DD", requires = "from")]
    pub to: Option<NaiveDate>,

    /// List every provider order instead of querying the ledger's order numbers
    #[arg(long)]
    pub all_orders: bool,

    /// Largest cost difference treated as rounding noise
    #[arg(long, value_name = "AMOUNT")]
    pub tolerance: Option<Decimal>,

    #[arg(long)]
    pub page_size: Option<u32>,

    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Concurrent provider requests (1-8)
    #[arg(long)]
    pub workers: Option<usize>,

    /// When to fetch order detail: auto, always, never
    #[arg(long)]
    pub detail_policy: Option<DetailPolicy>,

    /// Provider API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Write the comparison table here instead of stdout
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,

    /// Write the `Order,Total` export here
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Write the orders outside tolerance here
    #[arg(long)]
    pub discrepancies: Option<PathBuf>,

    /// Write the full report as JSON here
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Exit 1 when any order is outside tolerance, mismatched, or missing provider data
    #[arg(long)]
    pub fail_on_discrepancy: bool,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            tolerance: self.tolerance,
            page_size: self.page_size,
            max_pages: self.max_pages,
            workers: self.workers,
            detail_policy: self.detail_policy,
            base_url: self.base_url.clone(),
        }
    }

    fn order_filter(&self, ledger: &[LedgerOrder]) -> OrderFilter {
        let date_range = self.from.zip(self.to);
        let identifiers = if self.all_orders || date_range.is_some() {
            None
        } else {
            Some(ledger.iter().map(|o| o.order_id.clone()).collect())
        };
        OrderFilter {
            date_range,
            identifiers,
        }
    }
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Ledger export (.csv, .tsv, .xlsx, .xls, .ods)
    #[arg(long, short = 'l')]
    pub ledger: PathBuf,

    /// Config file (default: ./ordercheck.toml when present)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    pub out: Option<PathBuf>,
}

// ── run ─────────────────────────────────────────────────────────────

pub fn cmd_run(args: RunArgs, quiet: bool) -> Result<(), CliError> {
    if let (Some(from), Some(to)) = (args.from, args.to) {
        if from > to {
            return Err(CliError::usage(format!("--from {from} is after --to {to}")));
        }
    }

    let (mut config, config_path) = AppConfig::load(args.config.as_deref())?;
    config.apply(&args.overrides())?;
    if let Some(path) = &config_path {
        log::info!("config: {}", path.display());
    }

    // Ledger problems surface before any credential or network use
    let ledger = load_ledger(&args.ledger, &config)?;
    let api_key = resolve_api_key(args.api_key.clone(), API_KEY_ENV)?;

    let cancel_flag = cancel::install();
    let client = ProviderClient::new(config.provider.clone(), api_key)
        .map_err(provider_err("provider client"))?
        .with_cancel_flag(cancel_flag.clone());

    let filter = args.order_filter(&ledger);
    let fetched = fetch_provider_orders(&client, &filter, &ledger, quiet)?;

    if cancel::is_cancelled(&cancel_flag) {
        return Err(CliError::provider("reconcile", ProviderError::Cancelled));
    }

    let report = reconcile_with_unfetched(
        &ledger,
        &fetched.orders,
        &fetched.failed_identifiers,
        &config.reconcile,
    );
    write_outputs(&args, &report)?;

    if !quiet {
        print_summary(&report);
    }

    if args.fail_on_discrepancy && report.summary.has_discrepancies() {
        return Err(CliError {
            code: EXIT_DISCREPANCIES,
            message: format!(
                "discrepancies found: {} outside tolerance, {} quantity mismatch, {} without provider data",
                report.summary.ledger_more_expensive + report.summary.provider_more_expensive,
                report.summary.quantity_mismatch,
                report.summary.no_data
            ),
            hint: None,
        });
    }

    Ok(())
}

fn provider_err(stage: &'static str) -> impl Fn(ProviderError) -> CliError {
    move |e| CliError::provider(stage, e)
}

fn load_ledger(path: &Path, config: &AppConfig) -> Result<Vec<LedgerOrder>, CliError> {
    let sheet = read_ledger(path)?;
    let orders = sheet.normalize(&config.ledger.columns).map_err(|e| {
        let schema = e.is_schema_error();
        let err = CliError::recon("ledger", e);
        if schema {
            err.with_hint("add the header to [ledger.columns] in ordercheck.toml")
        } else {
            err
        }
    })?;
    log::info!(
        "ledger {}: {} rows, {} orders",
        path.display(),
        sheet.rows.len(),
        orders.len()
    );
    Ok(orders)
}

struct FetchedOrders {
    orders: Vec<ProviderOrder>,
    /// Ledger identifiers whose provider query failed outright.
    failed_identifiers: HashSet<String>,
}

fn fetch_provider_orders(
    client: &ProviderClient,
    filter: &OrderFilter,
    ledger: &[LedgerOrder],
    quiet: bool,
) -> Result<FetchedOrders, CliError> {
    if ledger.is_empty() {
        log::info!("ledger has no orders, skipping provider");
        return Ok(FetchedOrders {
            orders: Vec::new(),
            failed_identifiers: HashSet::new(),
        });
    }

    client.authenticate().map_err(provider_err("authenticate"))?;
    let listing = client
        .list_orders(filter)
        .map_err(provider_err("list orders"))?;

    if !quiet {
        eprintln!(
            "fetched {} provider orders ({} pages)",
            listing.orders.len(),
            listing.pages_fetched
        );
        for warning in &listing.warnings {
            eprintln!("warning: incomplete listing: {warning}");
        }
    }

    // Detail is only worth fetching for orders the ledger will look up
    let wanted: HashSet<String> = ledger.iter().map(|o| normalize(&o.order_id)).collect();
    let mut orders = listing.orders;
    let outcome = client
        .enrich_orders(&mut orders, client.config().detail_policy, Some(&wanted))
        .map_err(provider_err("order detail"))?;
    if !quiet && outcome.requested > 0 {
        eprintln!(
            "order detail: {} fetched, {} unavailable",
            outcome.enriched, outcome.failed
        );
    }

    Ok(FetchedOrders {
        orders,
        failed_identifiers: listing.failed_identifiers.into_iter().collect(),
    })
}

fn write_outputs(args: &RunArgs, report: &ReconciliationReport) -> Result<(), CliError> {
    let tables = build(report);

    match &args.out {
        Some(path) => write_table(path, &tables.comparison)?,
        None => write_stdout(&tables.comparison)?,
    }
    if let Some(path) = &args.discrepancies {
        write_table(path, &tables.discrepancies)?;
    }
    if let Some(path) = &args.export {
        write_table(path, &tables.export)?;
    }
    if let Some(path) = &args.json {
        let json = to_json(report).map_err(|e| CliError::recon("report", e))?;
        std::fs::write(path, json)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    }
    Ok(())
}

fn write_table(path: &Path, table: &Table) -> Result<(), CliError> {
    let file = File::create(path)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    table
        .write_csv(BufWriter::new(file))
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn write_stdout(table: &Table) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    table
        .write_csv(&mut handle)
        .map_err(|e| CliError::io(format!("cannot write to stdout: {e}")))?;
    handle
        .flush()
        .map_err(|e| CliError::io(format!("cannot write to stdout: {e}")))
}

fn print_summary(report: &ReconciliationReport) {
    let s = &report.summary;
    let t = &report.totals;
    eprintln!(
        "reconciled {} orders: {} matched ({} quantity equal, {} quantity mismatch), {} without provider data ({} not found, {} detail unavailable, {} fetch failed)",
        s.total_orders,
        s.matched,
        s.quantity_equal,
        s.quantity_mismatch,
        s.no_data,
        s.not_found,
        s.detail_unavailable,
        s.fetch_failed,
    );
    eprintln!(
        "cost: {} ledger more expensive, {} provider more expensive (tolerance {})",
        s.ledger_more_expensive,
        s.provider_more_expensive,
        format_money(report.meta.tolerance),
    );
    eprintln!(
        "totals: ledger {}, provider {}, difference {}",
        format_money(t.ledger_total),
        format_money(t.provider_total),
        format_money(t.cost_delta),
    );
    if report.meta.duplicate_provider_orders > 0 {
        eprintln!(
            "note: {} duplicate provider orders ignored (first one per order number kept)",
            report.meta.duplicate_provider_orders
        );
    }
}

// ── normalize ───────────────────────────────────────────────────────

pub fn cmd_normalize(args: NormalizeArgs) -> Result<(), CliError> {
    let (config, _) = AppConfig::load(args.config.as_deref())?;
    let orders = load_ledger(&args.ledger, &config)?;
    let table = ledger_table(&orders);
    match &args.out {
        Some(path) => write_table(path, &table),
        None => write_stdout(&table),
    }
}
