use std::collections::HashSet;

use crate::classify::classify_order;
use crate::config::ReconConfig;
use crate::evidence::{compute_summary, compute_totals};
use crate::items::ItemCountRules;
use crate::matcher::ProviderIndex;
use crate::ident::normalize;
use crate::model::{
    LedgerOrder, MatchResult, NoDataReason, ProviderOrder, ReconMeta, ReconciliationReport,
};

/// Reconcile ledger orders against provider orders.
///
/// Emits exactly one `MatchResult` per ledger order, in ledger order.
/// Pure: no IO, no clock beyond the report timestamp.
pub fn reconcile(
    ledger: &[LedgerOrder],
    provider: &[ProviderOrder],
    config: &ReconConfig,
) -> ReconciliationReport {
    reconcile_with_unfetched(ledger, provider, &HashSet::new(), config)
}

/// Like [`reconcile`], but ledger orders whose provider query failed
/// (`unfetched`, by identifier) and that have no provider record are
/// reported as `fetch_failed` instead of `not_found`.
pub fn reconcile_with_unfetched(
    ledger: &[LedgerOrder],
    provider: &[ProviderOrder],
    unfetched: &HashSet<String>,
    config: &ReconConfig,
) -> ReconciliationReport {
    let index = ProviderIndex::build(provider);
    let rules = ItemCountRules::from_config(config);
    let unfetched: HashSet<String> = unfetched.iter().map(|id| normalize(id)).collect();

    let results: Vec<MatchResult> = ledger
        .iter()
        .map(|order| {
            let mut result =
                classify_order(order, index.get(&order.order_id), &rules, config.tolerance);
            if result.no_data_reason == Some(NoDataReason::NotFound)
                && unfetched.contains(&result.order_id)
            {
                result.no_data_reason = Some(NoDataReason::FetchFailed);
            }
            result
        })
        .collect();

    let summary = compute_summary(&results);
    let totals = compute_totals(&results);

    log::info!(
        "reconciled {} ledger orders against {} provider orders ({} matched, {} without data)",
        ledger.len(),
        index.len(),
        summary.matched,
        summary.no_data
    );

    ReconciliationReport {
        meta: ReconMeta {
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
            tolerance: config.tolerance,
            duplicate_provider_orders: index.duplicates(),
        },
        summary,
        totals,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CostDirection, LineItem, NoDataReason, QuantityMatch};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn ledger(id: &str, total: Decimal, items: Decimal) -> LedgerOrder {
        LedgerOrder {
            order_id: id.into(),
            total_cost: total,
            item_count: items,
            declared_total: total,
        }
    }

    fn provider(reference: &str, amount: Decimal, items: Vec<LineItem>) -> ProviderOrder {
        ProviderOrder {
            provider_order_id: format!("CJ{reference}"),
            external_reference_id: Some(reference.into()),
            order_amount: amount,
            line_items: items,
            detail_error: None,
        }
    }

    #[test]
    fn one_result_per_ledger_order_in_ledger_order() {
        let ledger_orders = vec![
            ledger("#3", dec!(1), dec!(1)),
            ledger("#1", dec!(1), dec!(1)),
            ledger("#2", dec!(1), dec!(1)),
        ];
        let provider_orders = vec![
            provider("1", dec!(1), vec![LineItem::new("a", dec!(1))]),
            provider("2", dec!(1), vec![LineItem::new("a", dec!(1))]),
            provider("9", dec!(1), vec![LineItem::new("a", dec!(1))]),
        ];
        let report = reconcile(&ledger_orders, &provider_orders, &ReconConfig::default());
        let ids: Vec<&str> = report.results.iter().map(|r| r.order_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(report.results[0].no_data_reason, Some(NoDataReason::NotFound));
        assert_eq!(report.summary.matched, 2);
    }

    #[test]
    fn end_to_end_single_order() {
        let ledger_orders = vec![ledger("#1001", dec!(25.00), dec!(2))];
        let provider_orders = vec![provider("1001", dec!(20.00), vec![LineItem::new("Mug", dec!(2))])];
        let report = reconcile(&ledger_orders, &provider_orders, &ReconConfig::default());

        let r = &report.results[0];
        assert_eq!(r.order_id, "1001");
        assert_eq!(r.ledger_total, dec!(25.00));
        assert_eq!(r.provider_total(), Some(dec!(20.00)));
        assert_eq!(r.cost_delta(), Some(dec!(5.00)));
        assert_eq!(r.quantity_match, QuantityMatch::Equal);
        assert_eq!(r.direction(), Some(CostDirection::LedgerMoreExpensive));
        assert_eq!(report.ledger_more_expensive().len(), 1);
        assert!(report.provider_more_expensive().is_empty());
    }

    #[test]
    fn tolerance_absorbs_rounding_noise() {
        let config = ReconConfig {
            tolerance: dec!(0.02),
            ..ReconConfig::default()
        };
        let ledger_orders = vec![ledger("1", dec!(10.01), dec!(1))];
        let provider_orders = vec![provider("1", dec!(10.00), vec![LineItem::new("x", dec!(1))])];
        let report = reconcile(&ledger_orders, &provider_orders, &config);
        assert_eq!(report.results[0].direction(), Some(CostDirection::WithinTolerance));
        assert!(report.discrepancies().is_empty());
        assert_eq!(report.meta.tolerance, dec!(0.02));
    }

    #[test]
    fn duplicate_provider_records_counted() {
        let ledger_orders = vec![ledger("1", dec!(10), dec!(1))];
        let provider_orders = vec![
            provider("1", dec!(10), vec![LineItem::new("x", dec!(1))]),
            provider("#1", dec!(99), vec![LineItem::new("x", dec!(7))]),
        ];
        let report = reconcile(&ledger_orders, &provider_orders, &ReconConfig::default());
        assert_eq!(report.meta.duplicate_provider_orders, 1);
        assert_eq!(report.results[0].provider_total(), Some(dec!(10)));
    }

    #[test]
    fn failed_queries_are_not_reported_as_missing() {
        let ledger_orders = vec![
            ledger("#1", dec!(10), dec!(1)),
            ledger("#2", dec!(10), dec!(1)),
            ledger("#3", dec!(10), dec!(1)),
        ];
        let provider_orders = vec![provider("3", dec!(10), vec![LineItem::new("x", dec!(1))])];
        let unfetched: HashSet<String> = ["#2".to_string(), "3".to_string()].into();
        let report = reconcile_with_unfetched(
            &ledger_orders,
            &provider_orders,
            &unfetched,
            &ReconConfig::default(),
        );
        assert_eq!(report.results[0].no_data_reason, Some(NoDataReason::NotFound));
        assert_eq!(report.results[1].no_data_reason, Some(NoDataReason::FetchFailed));
        // A record that did arrive still matches
        assert_eq!(report.results[2].quantity_match, QuantityMatch::Equal);
        assert_eq!(report.summary.not_found, 1);
        assert_eq!(report.summary.fetch_failed, 1);
        assert_eq!(report.summary.no_data, 2);
    }

    #[test]
    fn empty_inputs() {
        let report = reconcile(&[], &[], &ReconConfig::default());
        assert!(report.results.is_empty());
        assert_eq!(report.summary.total_orders, 0);
        assert_eq!(report.totals.ledger_total, Decimal::ZERO);
    }
}
