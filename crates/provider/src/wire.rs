//! Provider JSON shape → domain types.
//!
//! Field names drift between API versions, so every lookup goes through a
//! candidate list. Nothing outside this module inspects raw response JSON.

use std::str::FromStr;

use ordercheck_recon::ident::normalize;
use ordercheck_recon::model::{LineItem, ProviderOrder};
use rust_decimal::Decimal;
use serde_json::Value;

pub const PROVIDER_ID_FIELDS: &[&str] = &["orderId", "id", "cjOrderId"];
pub const IDENTIFIER_FIELDS: &[&str] = &[
    "orderNum",
    "orderNumber",
    "thirdOrderId",
    "shopifyOrderId",
    "platformOrderId",
];
pub const AMOUNT_FIELDS: &[&str] = &["orderAmount", "totalAmount", "amount"];
pub const ITEM_ARRAY_FIELDS: &[&str] = &["productList", "orderProductVos", "products", "lineItems"];
pub const QUANTITY_FIELDS: &[&str] = &["quantity", "orderQuantity", "qty"];
pub const NAME_FIELDS: &[&str] = &["productName", "nameEn", "variantName", "name", "sku"];
pub const BUNDLE_FLAG_FIELDS: &[&str] = &["isGroup", "isBundle", "bundle"];
pub const COMPONENT_FIELDS: &[&str] = &["subProducts", "groupProducts", "components", "children"];
pub const LIST_FIELDS: &[&str] = &["list", "content", "records"];

/// Order detail as returned by the detail endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetail {
    pub order_amount: Option<Decimal>,
    pub line_items: Vec<LineItem>,
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn as_i64(v: &Value) -> Option<i64> {
    v.as_i64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Payload status code, when the body carries one.
pub fn payload_code(body: &Value) -> Option<i64> {
    as_i64(&body["code"])
}

/// `Err((code, message))` when the payload reports failure: a `code` other
/// than 200/0, or `result`/`success` set to false.
pub fn check_envelope(body: &Value) -> Result<(), (i64, String)> {
    let code = payload_code(body);
    let code_ok = code.map_or(true, |c| c == 200 || c == 0);
    let result_ok = body["result"].as_bool().unwrap_or(true);
    let success_ok = body["success"].as_bool().unwrap_or(true);

    if code_ok && result_ok && success_ok {
        return Ok(());
    }

    let message = body["message"]
        .as_str()
        .or_else(|| body["msg"].as_str())
        .unwrap_or("no message")
        .to_string();
    Err((code.unwrap_or(-1), message))
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn first_field<'a>(obj: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .map(|k| &obj[*k])
        .find(|v| !v.is_null())
}

/// Text value of the first present candidate. Numbers are rendered as text.
pub fn text_field(obj: &Value, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|k| match &obj[*k] {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Decimal from a JSON number or numeric string.
pub fn decimal_value(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .ok()
        }
        Value::String(s) => {
            let s = s.trim();
            Decimal::from_str(s).or_else(|_| Decimal::from_scientific(s)).ok()
        }
        _ => None,
    }
}

pub fn decimal_field(obj: &Value, candidates: &[&str]) -> Option<Decimal> {
    candidates.iter().find_map(|k| decimal_value(&obj[*k]))
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "y" | "yes"),
        _ => false,
    }
}

fn array_field<'a>(obj: &'a Value, candidates: &[&str]) -> Option<&'a Vec<Value>> {
    first_field(obj, candidates).and_then(|v| v.as_array())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

/// Order records on a listing page: `data.list`, `data.content`,
/// `data.records`, or `data` itself when it is an array. A null `data` on a
/// successful envelope is an empty page.
pub fn order_records(body: &Value) -> Result<&[Value], String> {
    let data = &body["data"];
    if data.is_null() {
        return Ok(&[]);
    }
    if let Some(arr) = data.as_array() {
        return Ok(arr.as_slice());
    }
    if let Some(arr) = array_field(data, LIST_FIELDS) {
        return Ok(arr.as_slice());
    }
    if LIST_FIELDS.iter().any(|k| data.get(*k).is_some_and(Value::is_null)) {
        return Ok(&[]);
    }
    Err("response has no order list (expected data.list, data.content or data.records)".into())
}

/// Map one listed order record. `Err` names what was missing.
pub fn parse_order(record: &Value) -> Result<ProviderOrder, String> {
    let provider_order_id = text_field(record, PROVIDER_ID_FIELDS)
        .ok_or_else(|| "order record has no provider id".to_string())?;
    let order_amount = decimal_field(record, AMOUNT_FIELDS)
        .ok_or_else(|| format!("order {provider_order_id} has no amount"))?;

    let external_reference_id = IDENTIFIER_FIELDS
        .iter()
        .filter_map(|k| text_field(record, &[*k]))
        .map(|raw| normalize(&raw))
        .find(|id| !id.is_empty());

    Ok(ProviderOrder {
        provider_order_id,
        external_reference_id,
        order_amount,
        line_items: parse_line_items(record),
        detail_error: None,
    })
}

pub fn parse_line_items(obj: &Value) -> Vec<LineItem> {
    array_field(obj, ITEM_ARRAY_FIELDS)
        .map(|items| items.iter().map(parse_line_item).collect())
        .unwrap_or_default()
}

/// One product line. Missing quantities count as zero; a line with component
/// products is a bundle even without an explicit flag.
pub fn parse_line_item(v: &Value) -> LineItem {
    let components: Vec<LineItem> = array_field(v, COMPONENT_FIELDS)
        .map(|items| items.iter().map(parse_line_item).collect())
        .unwrap_or_default();
    let flagged = first_field(v, BUNDLE_FLAG_FIELDS).is_some_and(truthy);

    LineItem {
        name: text_field(v, NAME_FIELDS).unwrap_or_default(),
        quantity: decimal_field(v, QUANTITY_FIELDS).unwrap_or(Decimal::ZERO),
        is_bundle: flagged || !components.is_empty(),
        components,
    }
}

// ---------------------------------------------------------------------------
// Detail
// ---------------------------------------------------------------------------

pub fn parse_detail(body: &Value) -> Result<OrderDetail, String> {
    let data = &body["data"];
    if !data.is_object() {
        return Err("detail response has no data object".into());
    }
    if array_field(data, ITEM_ARRAY_FIELDS).is_none() {
        return Err("detail response has no line items".into());
    }
    Ok(OrderDetail {
        order_amount: decimal_field(data, AMOUNT_FIELDS),
        line_items: parse_line_items(data),
    })
}

/// Whether the listing already carries enough to count items: at least one
/// line, and no bundle whose components are missing.
pub fn has_computable_quantities(order: &ProviderOrder) -> bool {
    fn complete(items: &[LineItem]) -> bool {
        items
            .iter()
            .all(|i| !i.is_bundle || (!i.components.is_empty() && complete(&i.components)))
    }
    !order.line_items.is_empty() && complete(&order.line_items)
}
