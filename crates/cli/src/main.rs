// ordercheck CLI - reconcile a merchant cost ledger against fulfillment provider orders

mod cancel;
mod config;
mod exit_codes;
mod ledger_io;
mod logging;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use ordercheck_provider::ProviderError;
use ordercheck_recon::ReconError;

use exit_codes::{provider_exit_code, recon_exit_code, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "ordercheck")]
#[command(about = "Reconcile a merchant order-cost ledger against fulfillment provider orders")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch provider orders for a ledger and write the comparison tables
    #[command(after_help = "\
Exit codes: 0 ok, 1 discrepancies (with --fail-on-discrepancy), 2 usage, 3 I/O,
60 ledger schema, 61 missing API key, 62 auth rejected, 63 cancelled, 64 config.

Examples:
  ordercheck run --ledger orders.csv
  ordercheck run --ledger orders.xlsx --out comparison.csv --export totals.csv
  ordercheck run --ledger orders.csv --from 2026-01-01 --to 2026-01-31 --tolerance 0.05
  ordercheck run --ledger orders.csv --json report.json --fail-on-discrepancy -q")]
    Run(run::RunArgs),

    /// Print the ledger as one row per order, without contacting the provider
    #[command(after_help = "\
Examples:
  ordercheck normalize --ledger orders.csv
  ordercheck normalize --ledger orders.xlsx -o orders-normalized.csv")]
    Normalize(run::NormalizeArgs),

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Validate a config file without running
    Check {
        /// Config file (default: ./ordercheck.toml when present)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    /// Engine error, prefixed with the pipeline stage that raised it.
    pub fn recon(stage: &str, err: ReconError) -> Self {
        Self { code: recon_exit_code(&err), message: format!("{stage}: {err}"), hint: None }
    }

    /// Provider error, prefixed with the pipeline stage that raised it.
    pub fn provider(stage: &str, err: ProviderError) -> Self {
        let hint = match &err {
            ProviderError::Auth(_) => {
                Some(format!("check the API key in --api-key or {}", config::API_KEY_ENV))
            }
            _ => None,
        };
        Self { code: provider_exit_code(&err), message: format!("{stage}: {err}"), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// config check
// ============================================================================

fn cmd_config_check(path: Option<PathBuf>) -> Result<(), CliError> {
    let (config, used) = config::AppConfig::load(path.as_deref())?;
    match used {
        Some(p) => eprintln!("config ok: {}", p.display()),
        None => eprintln!("no {} found, built-in defaults are valid", config::DEFAULT_CONFIG_FILE),
    }
    eprintln!(
        "provider: {} (detail {}, {} workers, {} per page, up to {} pages)",
        config.provider.base_url,
        config.provider.detail_policy,
        config.provider.worker_count(),
        config.provider.page_size,
        config.provider.max_pages,
    );
    eprintln!(
        "reconcile: tolerance {}, bundles {}, packaging exclusion {}",
        config.reconcile.tolerance,
        if config.reconcile.expand_bundles { "expanded" } else { "counted as one line" },
        if config.reconcile.exclude_packaging { "on" } else { "off" },
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args, cli.quiet),
        Commands::Normalize(args) => run::cmd_normalize(args),
        Commands::Config { command } => match command {
            ConfigCommands::Check { config } => cmd_config_check(config),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
