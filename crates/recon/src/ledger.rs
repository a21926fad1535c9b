//! Ledger normalization: loosely structured export rows → one [`LedgerOrder`]
//! per order label.
//!
//! Store exports repeat the order label only on the first line item of each
//! order and name their columns inconsistently across versions, so columns are
//! resolved through a synonym table and labels are forward-filled.

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::config::ColumnSynonyms;
use crate::error::ReconError;
use crate::model::LedgerOrder;

/// One raw ledger row: column header → cell text.
pub type RawRow = HashMap<String, String>;

/// A ledger file as read: its header row plus the data rows keyed by it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSheet {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl LedgerSheet {
    /// Normalize against the header row, so a ledger with no data rows still
    /// fails on missing columns.
    pub fn normalize(&self, synonyms: &ColumnSynonyms) -> Result<Vec<LedgerOrder>, ReconError> {
        let headers = self.headers.iter().filter(|h| !h.is_empty());
        let columns = resolve_columns(headers, synonyms)?;
        group_rows(&self.rows, &columns)
    }
}

// ---------------------------------------------------------------------------
// Column resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerField {
    OrderLabel,
    Quantity,
    UnitCost,
    OrderTotal,
}

impl LedgerField {
    pub const ALL: [LedgerField; 4] = [
        LedgerField::OrderLabel,
        LedgerField::Quantity,
        LedgerField::UnitCost,
        LedgerField::OrderTotal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderLabel => "order label",
            Self::Quantity => "quantity",
            Self::UnitCost => "unit cost",
            Self::OrderTotal => "order total",
        }
    }

    /// Built-in header synonyms, already in [`header_key`] form.
    fn builtin_synonyms(&self) -> &'static [&'static str] {
        match self {
            Self::OrderLabel => &[
                "name",
                "order",
                "ordername",
                "orderid",
                "ordernumber",
                "orderno",
                "order#",
                "shopifyorderid",
            ],
            Self::Quantity => &[
                "qty",
                "quantity",
                "lineitemquantity",
                "itemquantity",
                "units",
            ],
            Self::UnitCost => &[
                "productfee",
                "unitcost",
                "productcost",
                "cost",
                "lineitemprice",
                "price",
            ],
            Self::OrderTotal => &[
                "totalprice",
                "total",
                "ordertotal",
                "grandtotal",
                "amount",
            ],
        }
    }

    fn configured<'a>(&self, synonyms: &'a ColumnSynonyms) -> &'a [String] {
        match self {
            Self::OrderLabel => &synonyms.order,
            Self::Quantity => &synonyms.quantity,
            Self::UnitCost => &synonyms.unit_cost,
            Self::OrderTotal => &synonyms.order_total,
        }
    }
}

/// Comparison form of a header: whitespace removed, lowercased.
pub fn header_key(header: &str) -> String {
    header
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Actual header names chosen for each ledger field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    pub order_label: String,
    pub quantity: String,
    pub unit_cost: String,
    pub order_total: String,
}

/// Pick a header for every field. Configured synonyms win over built-ins;
/// within a list, earlier synonyms win. Ties between headers with the same
/// key go to the lexicographically first header.
pub fn resolve_columns<'a, I>(headers: I, synonyms: &ColumnSynonyms) -> Result<ColumnMap, ReconError>
where
    I: IntoIterator<Item = &'a String>,
{
    let sorted: BTreeSet<&String> = headers.into_iter().collect();
    let keyed: Vec<(String, &String)> = sorted.into_iter().map(|h| (header_key(h), h)).collect();

    let find = |field: LedgerField| -> Result<String, ReconError> {
        let configured = field.configured(synonyms).iter().map(|s| header_key(s));
        let builtin = field.builtin_synonyms().iter().map(|s| s.to_string());
        let candidates: Vec<String> = configured.chain(builtin).collect();

        candidates
            .iter()
            .find_map(|want| keyed.iter().find(|(key, _)| key == want).map(|(_, h)| (*h).clone()))
            .ok_or_else(|| ReconError::MissingColumn {
                field: field.name(),
                accepted: candidates.clone(),
            })
    };

    Ok(ColumnMap {
        order_label: find(LedgerField::OrderLabel)?,
        quantity: find(LedgerField::Quantity)?,
        unit_cost: find(LedgerField::UnitCost)?,
        order_total: find(LedgerField::OrderTotal)?,
    })
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥'];

/// Parse a numeric cell. Tolerates currency symbols, thousands separators,
/// whitespace and accounting-style `(12.50)` negatives. `None` for blank or
/// unparsable text.
pub fn parse_decimal_cell(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };

    let value = Decimal::from_str(digits)
        .or_else(|_| Decimal::from_scientific(digits))
        .ok()?;
    Some(if negative { -value } else { value })
}

fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

struct OrderGroup {
    label: String,
    item_count: Decimal,
    total_cost: Decimal,
    declared_total: Option<Decimal>,
}

/// Collapse raw rows into one `LedgerOrder` per order label, in order of
/// first appearance.
///
/// Blank labels inherit the nearest preceding label. Quantity and cost are
/// summed; the order total is taken from the first row of the group that
/// carries one (exports repeat it on every line). Unparsable numeric cells
/// count as zero.
pub fn normalize_ledger(
    rows: &[RawRow],
    synonyms: &ColumnSynonyms,
) -> Result<Vec<LedgerOrder>, ReconError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let columns = resolve_columns(rows.iter().flat_map(|r| r.keys()), synonyms)?;
    group_rows(rows, &columns)
}

fn group_rows(rows: &[RawRow], columns: &ColumnMap) -> Result<Vec<LedgerOrder>, ReconError> {
    let mut groups: Vec<OrderGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut current_label: Option<String> = None;

    for (row_num, row) in rows.iter().enumerate() {
        let cell = |column: &str| row.get(column).map(|s| s.as_str()).unwrap_or("");

        let raw_label = cell(&columns.order_label).trim();
        let label = if raw_label.is_empty() {
            match &current_label {
                Some(prev) => prev.clone(),
                None => {
                    return Err(ReconError::MissingAnchor {
                        column: columns.order_label.clone(),
                    })
                }
            }
        } else {
            raw_label.to_string()
        };
        current_label = Some(label.clone());

        let number = |column: &str| -> Decimal {
            let text = cell(column);
            match parse_decimal_cell(text) {
                Some(v) => v,
                None => {
                    if !text.trim().is_empty() {
                        log::debug!("row {}: '{column}' value '{text}' is not a number, using 0", row_num + 1);
                    }
                    Decimal::ZERO
                }
            }
        };

        let quantity = number(&columns.quantity);
        let cost = number(&columns.unit_cost);
        let total = parse_decimal_cell(cell(&columns.order_total));

        let slot = *index.entry(label.clone()).or_insert_with(|| {
            groups.push(OrderGroup {
                label,
                item_count: Decimal::ZERO,
                total_cost: Decimal::ZERO,
                declared_total: None,
            });
            groups.len() - 1
        });

        let group = &mut groups[slot];
        match group.item_count.checked_add(quantity) {
            Some(sum) => group.item_count = sum,
            None => log::warn!("row {}: quantity {quantity} overflows the order sum, ignoring it", row_num + 1),
        }
        match group.total_cost.checked_add(cost) {
            Some(sum) => group.total_cost = sum,
            None => log::warn!("row {}: cost {cost} overflows the order sum, ignoring it", row_num + 1),
        }
        if group.declared_total.is_none() {
            group.declared_total = total;
        }
    }

    log::debug!("ledger: {} rows → {} orders", rows.len(), groups.len());

    Ok(groups
        .into_iter()
        .map(|g| LedgerOrder {
            order_id: g.label,
            total_cost: money(g.total_cost),
            item_count: g.item_count,
            declared_total: money(g.declared_total.unwrap_or(Decimal::ZERO)),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Delimited text input
// ---------------------------------------------------------------------------

/// Read comma-separated ledger text.
pub fn read_ledger_csv(text: &str) -> Result<LedgerSheet, ReconError> {
    read_ledger_delimited(text, b',')
}

/// Read delimited ledger text (first row = headers). Short records are
/// allowed; missing cells are treated as blank.
pub fn read_ledger_delimited(text: &str, delimiter: u8) -> Result<LedgerSheet, ReconError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| ReconError::Io(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ReconError::Io(e.to_string()))?;
        let cells: Vec<&str> = record.iter().collect();
        rows.push(raw_row(&headers, &cells));
    }

    Ok(LedgerSheet { headers, rows })
}

/// Pair one record's cells with the header row. Blank headers are skipped;
/// when a header repeats, its first column wins.
pub fn raw_row<S: AsRef<str>>(headers: &[String], cells: &[S]) -> RawRow {
    let mut row = RawRow::new();
    for (h, val) in headers.iter().zip(cells) {
        if h.is_empty() {
            continue;
        }
        row.entry(h.clone()).or_insert_with(|| val.as_ref().to_string());
    }
    row
}
