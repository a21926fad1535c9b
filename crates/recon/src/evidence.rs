use rust_decimal::Decimal;

use crate::model::{CostDirection, MatchResult, NoDataReason, QuantityMatch, ReconSummary, ReportTotals};

/// Compute summary statistics from classified results.
pub fn compute_summary(results: &[MatchResult]) -> ReconSummary {
    let mut summary = ReconSummary {
        total_orders: results.len(),
        ..ReconSummary::default()
    };

    for r in results {
        match r.quantity_match {
            QuantityMatch::Equal => summary.quantity_equal += 1,
            QuantityMatch::Mismatch => summary.quantity_mismatch += 1,
            QuantityMatch::NoData => summary.no_data += 1,
        }

        match r.no_data_reason {
            Some(NoDataReason::NotFound) => summary.not_found += 1,
            Some(NoDataReason::DetailUnavailable) => summary.detail_unavailable += 1,
            Some(NoDataReason::FetchFailed) => summary.fetch_failed += 1,
            None => {}
        }

        match r.direction() {
            Some(CostDirection::LedgerMoreExpensive) => summary.ledger_more_expensive += 1,
            Some(CostDirection::ProviderMoreExpensive) => summary.provider_more_expensive += 1,
            Some(CostDirection::WithinTolerance) | None => {}
        }

        if r.provider.is_some() {
            summary.matched += 1;
        }
    }

    summary
}

/// Column sums. Provider-side sums only see matched orders.
pub fn compute_totals(results: &[MatchResult]) -> ReportTotals {
    let mut totals = ReportTotals::default();
    for r in results {
        totals.ledger_total += r.ledger_total;
        totals.ledger_item_count += r.ledger_item_count;
        if let Some(p) = &r.provider {
            totals.provider_total += p.total;
            totals.provider_item_count += p.item_count;
            totals.cost_delta += p.cost_delta;
        }
    }
    totals
}

/// Sum of `cost_delta` over the given results (unmatched ones contribute nothing).
pub fn sum_deltas<'a, I>(results: I) -> Decimal
where
    I: IntoIterator<Item = &'a MatchResult>,
{
    results.into_iter().filter_map(|r| r.cost_delta()).sum()
}
