use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One merchant order after ledger normalization. `order_id` is the label as
/// it appeared in the ledger (not yet identifier-normalized).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerOrder {
    pub order_id: String,
    /// Sum of the per-line cost column.
    pub total_cost: Decimal,
    /// Sum of the per-line quantity column.
    pub item_count: Decimal,
    /// First non-blank order total seen for the order.
    pub declared_total: Decimal,
}

/// A product line on a provider order. Bundles carry their constituent
/// products in `components`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub is_bundle: bool,
    #[serde(default)]
    pub components: Vec<LineItem>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            name: name.into(),
            quantity,
            is_bundle: false,
            components: Vec::new(),
        }
    }

    pub fn bundle(name: impl Into<String>, quantity: Decimal, components: Vec<LineItem>) -> Self {
        Self {
            name: name.into(),
            quantity,
            is_bundle: true,
            components,
        }
    }
}

/// An order as reported by the fulfillment provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub provider_order_id: String,
    /// The merchant's order label echoed back by the provider, if any.
    pub external_reference_id: Option<String>,
    pub order_amount: Decimal,
    pub line_items: Vec<LineItem>,
    /// Set when detail enrichment was required for this order but failed.
    /// Such orders must not be trusted for cost or quantity.
    #[serde(default)]
    pub detail_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuantityMatch {
    Equal,
    Mismatch,
    NoData,
}

impl std::fmt::Display for QuantityMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Equal => write!(f, "EQUAL"),
            Self::Mismatch => write!(f, "MISMATCH"),
            Self::NoData => write!(f, "NO_DATA"),
        }
    }
}

/// Why a ledger order has no provider figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoDataReason {
    NotFound,
    DetailUnavailable,
    /// The provider was queried for this order but the query failed.
    FetchFailed,
}

impl std::fmt::Display for NoDataReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::DetailUnavailable => write!(f, "detail_unavailable"),
            Self::FetchFailed => write!(f, "fetch_failed"),
        }
    }
}

/// Sign of `ledger_total - provider_total` relative to the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CostDirection {
    WithinTolerance,
    LedgerMoreExpensive,
    ProviderMoreExpensive,
}

impl std::fmt::Display for CostDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WithinTolerance => write!(f, "within_tolerance"),
            Self::LedgerMoreExpensive => write!(f, "ledger_more_expensive"),
            Self::ProviderMoreExpensive => write!(f, "provider_more_expensive"),
        }
    }
}

/// Provider-side figures for a matched order. Present as a unit or not at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFigures {
    pub provider_order_id: String,
    pub total: Decimal,
    pub item_count: Decimal,
    /// `ledger_total - total`.
    pub cost_delta: Decimal,
    pub direction: CostDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Normalized order identifier.
    pub order_id: String,
    pub ledger_total: Decimal,
    pub ledger_item_count: Decimal,
    pub provider: Option<ProviderFigures>,
    pub quantity_match: QuantityMatch,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_data_reason: Option<NoDataReason>,
}

impl MatchResult {
    pub fn provider_total(&self) -> Option<Decimal> {
        self.provider.as_ref().map(|p| p.total)
    }

    pub fn provider_item_count(&self) -> Option<Decimal> {
        self.provider.as_ref().map(|p| p.item_count)
    }

    pub fn cost_delta(&self) -> Option<Decimal> {
        self.provider.as_ref().map(|p| p.cost_delta)
    }

    pub fn direction(&self) -> Option<CostDirection> {
        self.provider.as_ref().map(|p| p.direction)
    }

    pub fn exceeds_tolerance(&self) -> bool {
        matches!(
            self.direction(),
            Some(CostDirection::LedgerMoreExpensive | CostDirection::ProviderMoreExpensive)
        )
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Column sums over all results. Provider sums cover matched orders only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTotals {
    pub ledger_total: Decimal,
    pub provider_total: Decimal,
    pub cost_delta: Decimal,
    pub ledger_item_count: Decimal,
    pub provider_item_count: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub total_orders: usize,
    pub matched: usize,
    pub quantity_equal: usize,
    pub quantity_mismatch: usize,
    pub no_data: usize,
    pub not_found: usize,
    pub detail_unavailable: usize,
    pub fetch_failed: usize,
    pub ledger_more_expensive: usize,
    pub provider_more_expensive: usize,
}

impl ReconSummary {
    /// Any cost or quantity disagreement, or any order the provider could not account for.
    pub fn has_discrepancies(&self) -> bool {
        self.quantity_mismatch > 0
            || self.no_data > 0
            || self.ledger_more_expensive > 0
            || self.provider_more_expensive > 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub engine_version: String,
    pub run_at: String,
    pub tolerance: Decimal,
    /// Provider orders dropped because an earlier order had the same identifier.
    pub duplicate_provider_orders: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub meta: ReconMeta,
    pub summary: ReconSummary,
    pub totals: ReportTotals,
    pub results: Vec<MatchResult>,
}

impl ReconciliationReport {
    pub fn ledger_more_expensive(&self) -> Vec<&MatchResult> {
        self.with_direction(CostDirection::LedgerMoreExpensive)
    }

    pub fn provider_more_expensive(&self) -> Vec<&MatchResult> {
        self.with_direction(CostDirection::ProviderMoreExpensive)
    }

    /// Results outside tolerance in either direction, in ledger order.
    pub fn discrepancies(&self) -> Vec<&MatchResult> {
        self.results.iter().filter(|r| r.exceeds_tolerance()).collect()
    }

    fn with_direction(&self, direction: CostDirection) -> Vec<&MatchResult> {
        self.results
            .iter()
            .filter(|r| r.direction() == Some(direction))
            .collect()
    }
}
