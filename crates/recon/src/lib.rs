//! `ordercheck-recon`: order cost reconciliation engine.
//!
//! Pure engine crate: normalizes ledger rows, matches them against
//! pre-fetched provider orders, returns classified results and report tables.
//! No network or CLI dependencies.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod ident;
pub mod items;
pub mod ledger;
pub mod matcher;
pub mod model;
pub mod report;

pub use config::{ColumnSynonyms, LedgerConfig, ReconConfig};
pub use engine::{reconcile, reconcile_with_unfetched};
pub use error::ReconError;
pub use ident::normalize;
pub use ledger::{
    normalize_ledger, raw_row, read_ledger_csv, read_ledger_delimited, LedgerSheet, RawRow,
};
pub use model::{
    CostDirection, LedgerOrder, LineItem, MatchResult, NoDataReason, ProviderOrder,
    QuantityMatch, ReconciliationReport,
};
pub use report::{build, ledger_table, to_json, ExportTables, Table};
