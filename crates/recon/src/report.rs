//! Tabular renderings of a [`ReconciliationReport`].
//!
//! Three tables: the full comparison (one row per order plus a `TOTAL` row),
//! the orders outside tolerance with a summed delta row, and a minimal
//! `Order,Total` export of ledger totals.

use std::io::Write;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ReconError;
use crate::evidence::sum_deltas;
use crate::model::{LedgerOrder, MatchResult, ReconciliationReport};

pub const TOTAL_LABEL: &str = "TOTAL";

/// Placeholder for cells that have no meaning on a totals row.
pub const NOT_APPLICABLE: &str = "-";

pub const COMPARISON_HEADERS: [&str; 7] = [
    "Order",
    "Ledger Total",
    "Provider Total",
    "Cost Difference",
    "Ledger Items",
    "Provider Items",
    "Quantity Match",
];

pub const DISCREPANCY_HEADERS: [&str; 5] = [
    "Order",
    "Ledger Total",
    "Provider Total",
    "Cost Difference",
    "Direction",
];

pub const EXPORT_HEADERS: [&str; 2] = ["Order", "Total"];

pub const LEDGER_HEADERS: [&str; 4] = ["Order", "Items", "Line Cost", "Total"];

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ReconError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&self.headers)
            .map_err(|e| ReconError::Io(e.to_string()))?;
        for row in &self.rows {
            wtr.write_record(row).map_err(|e| ReconError::Io(e.to_string()))?;
        }
        wtr.flush().map_err(|e| ReconError::Io(e.to_string()))?;
        Ok(())
    }

    pub fn to_csv(&self) -> Result<String, ReconError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ReconError::Io(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportTables {
    pub comparison: Table,
    pub discrepancies: Table,
    pub export: Table,
}

/// Money cell: two decimals, half away from zero, no negative zero.
pub fn format_money(value: Decimal) -> String {
    let mut v = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    v.rescale(2);
    if v.is_zero() {
        v.set_sign_positive(true);
    }
    v.to_string()
}

/// Quantity cell: trailing zeros dropped (`2.0` → `2`).
pub fn format_quantity(value: Decimal) -> String {
    value.normalize().to_string()
}

fn opt(value: Option<Decimal>, fmt: fn(Decimal) -> String) -> String {
    value.map(fmt).unwrap_or_default()
}

fn comparison_row(r: &MatchResult) -> Vec<String> {
    vec![
        r.order_id.clone(),
        format_money(r.ledger_total),
        opt(r.provider_total(), format_money),
        opt(r.cost_delta(), format_money),
        format_quantity(r.ledger_item_count),
        opt(r.provider_item_count(), format_quantity),
        r.quantity_match.to_string(),
    ]
}

pub fn build(report: &ReconciliationReport) -> ExportTables {
    let mut comparison = Table::new(&COMPARISON_HEADERS);
    comparison.rows.extend(report.results.iter().map(comparison_row));
    let t = &report.totals;
    comparison.rows.push(vec![
        TOTAL_LABEL.to_string(),
        format_money(t.ledger_total),
        format_money(t.provider_total),
        format_money(t.cost_delta),
        format_quantity(t.ledger_item_count),
        format_quantity(t.provider_item_count),
        NOT_APPLICABLE.to_string(),
    ]);

    let flagged = report.discrepancies();
    let mut discrepancies = Table::new(&DISCREPANCY_HEADERS);
    discrepancies.rows.extend(flagged.iter().map(|r| {
        vec![
            r.order_id.clone(),
            format_money(r.ledger_total),
            opt(r.provider_total(), format_money),
            opt(r.cost_delta(), format_money),
            r.direction().map(|d| d.to_string()).unwrap_or_default(),
        ]
    }));
    discrepancies.rows.push(vec![
        TOTAL_LABEL.to_string(),
        NOT_APPLICABLE.to_string(),
        NOT_APPLICABLE.to_string(),
        format_money(sum_deltas(flagged.iter().copied())),
        NOT_APPLICABLE.to_string(),
    ]);

    let mut export = Table::new(&EXPORT_HEADERS);
    export.rows.extend(
        report
            .results
            .iter()
            .map(|r| vec![r.order_id.clone(), format_money(r.ledger_total)]),
    );

    ExportTables {
        comparison,
        discrepancies,
        export,
    }
}

/// Normalized ledger orders, one row each, before any matching.
pub fn ledger_table(orders: &[LedgerOrder]) -> Table {
    let mut table = Table::new(&LEDGER_HEADERS);
    table.rows.extend(orders.iter().map(|o| {
        vec![
            o.order_id.clone(),
            format_quantity(o.item_count),
            format_money(o.total_cost),
            format_money(o.declared_total),
        ]
    }));
    table
}

/// Full report as pretty JSON.
pub fn to_json(report: &ReconciliationReport) -> Result<String, ReconError> {
    serde_json::to_string_pretty(report).map_err(|e| ReconError::Io(e.to_string()))
}
