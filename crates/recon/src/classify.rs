use rust_decimal::Decimal;

use crate::ident::normalize;
use crate::items::ItemCountRules;
use crate::model::{
    CostDirection, LedgerOrder, MatchResult, NoDataReason, ProviderFigures, ProviderOrder,
    QuantityMatch,
};

/// Direction of `delta = ledger - provider` relative to a non-negative tolerance.
pub fn cost_direction(delta: Decimal, tolerance: Decimal) -> CostDirection {
    if delta > tolerance {
        CostDirection::LedgerMoreExpensive
    } else if delta < -tolerance {
        CostDirection::ProviderMoreExpensive
    } else {
        CostDirection::WithinTolerance
    }
}

/// Exact decimal equality: `5 == 5.0`, no tolerance on counts.
pub fn quantity_match(ledger: Decimal, provider: Decimal) -> QuantityMatch {
    if ledger == provider {
        QuantityMatch::Equal
    } else {
        QuantityMatch::Mismatch
    }
}

/// Classify one ledger order against its provider counterpart (if any).
pub fn classify_order(
    ledger: &LedgerOrder,
    provider: Option<&ProviderOrder>,
    rules: &ItemCountRules,
    tolerance: Decimal,
) -> MatchResult {
    let order_id = normalize(&ledger.order_id);
    let ledger_total = ledger.declared_total;

    let no_data = |reason: NoDataReason| MatchResult {
        order_id: order_id.clone(),
        ledger_total,
        ledger_item_count: ledger.item_count,
        provider: None,
        quantity_match: QuantityMatch::NoData,
        no_data_reason: Some(reason),
    };

    let Some(p) = provider else {
        return no_data(NoDataReason::NotFound);
    };
    if let Some(reason) = &p.detail_error {
        log::debug!("order {order_id}: provider detail unavailable ({reason})");
        return no_data(NoDataReason::DetailUnavailable);
    }

    let item_count = rules.order_count(&p.line_items);
    let cost_delta = ledger_total - p.order_amount;

    MatchResult {
        order_id: order_id.clone(),
        ledger_total,
        ledger_item_count: ledger.item_count,
        provider: Some(ProviderFigures {
            provider_order_id: p.provider_order_id.clone(),
            total: p.order_amount,
            item_count,
            cost_delta,
            direction: cost_direction(cost_delta, tolerance),
        }),
        quantity_match: quantity_match(ledger.item_count, item_count),
        no_data_reason: None,
    }
}
