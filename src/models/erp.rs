//! Remote ERP payload shapes and their defensive extraction.
//!
//! The API's JSON is inconsistent across endpoint generations: ids arrive
//! as numbers or strings, money fields as numbers or locale-formatted
//! strings, field names vary. Each resource is modeled as an explicit
//! optional-field struct here, and a dedicated extraction function turns it
//! into the typed record the stores persist. Extraction never panics; a
//! record without a usable id yields `None` and is skipped upstream.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::services::money::lenient_decimal;

// ---------------------------------------------------------------------------
// Typed records produced by extraction, consumed by the record stores
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceRecord {
    pub tenant_id: String,
    pub remote_id: String,
    pub number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub total_amount: Decimal,
    pub status: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivableRecord {
    pub tenant_id: String,
    pub remote_id: String,
    pub due_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub status: Option<String>,
    pub customer_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRecord {
    pub tenant_id: String,
    pub remote_id: String,
    pub order_date: Option<NaiveDate>,
    pub status: Option<String>,
    pub customer_name: Option<String>,
    pub total_amount: Decimal,
    pub items: Vec<OrderItemRecord>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, Deserialize)]
pub struct OrderItemRecord {
    pub product_id: Option<String>,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Resolved from the product cache, never from the order payload.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub remote_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
}

// ---------------------------------------------------------------------------
// Raw remote shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct RemoteInvoice {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "invoice_number")]
    pub number: Option<String>,
    #[serde(default, alias = "issued_at", alias = "issue_date")]
    pub date: Option<String>,
    #[serde(default, alias = "total_amount", alias = "amount")]
    pub total: Value,
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<RemoteParty>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteReceivable {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "due_at")]
    pub due_date: Option<String>,
    #[serde(default, alias = "value")]
    pub amount: Value,
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<RemoteParty>,
    #[serde(default)]
    pub customer_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteOrder {
    #[serde(default)]
    pub id: Value,
    #[serde(default, alias = "ordered_at", alias = "order_date")]
    pub date: Option<String>,
    #[serde(default, alias = "state")]
    pub status: Option<String>,
    #[serde(default)]
    pub customer: Option<RemoteParty>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default, alias = "total_amount")]
    pub total: Value,
    #[serde(default, alias = "line_items")]
    pub items: Vec<RemoteOrderItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteOrderItem {
    #[serde(default, alias = "productId")]
    pub product_id: Value,
    #[serde(default, alias = "name")]
    pub description: Option<String>,
    #[serde(default, alias = "qty")]
    pub quantity: Value,
    #[serde(default, alias = "price")]
    pub unit_price: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteProduct {
    #[serde(default)]
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "category_name")]
    pub category: Option<ValueOrNamed>,
    #[serde(default)]
    pub unit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemoteParty {
    #[serde(default)]
    pub name: Option<String>,
}

/// A field that is sometimes a bare string and sometimes `{"name": ...}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ValueOrNamed {
    Plain(String),
    Named(RemoteParty),
}

impl ValueOrNamed {
    fn into_string(self) -> Option<String> {
        match self {
            ValueOrNamed::Plain(s) => Some(s),
            ValueOrNamed::Named(p) => p.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Field-group extraction helpers
// ---------------------------------------------------------------------------

/// Remote ids arrive as numbers or strings; empty strings count as absent.
pub fn extract_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Dates come as "2026-03-01", "2026-03-01T10:00:00Z" or "01/03/2026".
pub fn extract_date(raw: &Option<String>) -> Option<NaiveDate> {
    let raw = raw.as_deref()?.trim();
    if raw.is_empty() {
        return None;
    }

    let head = raw.get(..raw.len().min(10)).unwrap_or(raw);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(head, "%d/%m/%Y"))
        .ok()
}

fn extract_party(party: Option<RemoteParty>, flat: Option<String>) -> Option<String> {
    party
        .and_then(|p| p.name)
        .or(flat)
        .filter(|s| !s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Per-resource extraction
// ---------------------------------------------------------------------------

pub fn extract_invoice(tenant_id: &str, payload: &Value) -> Option<InvoiceRecord> {
    let raw: RemoteInvoice = serde_json::from_value(payload.clone()).ok()?;
    let remote_id = extract_id(&raw.id)?;

    Some(InvoiceRecord {
        tenant_id: tenant_id.to_string(),
        remote_id,
        number: raw.number.filter(|n| !n.trim().is_empty()),
        issue_date: extract_date(&raw.date),
        total_amount: lenient_decimal(&raw.total, "invoice.total"),
        status: raw.status,
        customer_name: extract_party(raw.customer, raw.customer_name),
    })
}

pub fn extract_receivable(tenant_id: &str, payload: &Value) -> Option<ReceivableRecord> {
    let raw: RemoteReceivable = serde_json::from_value(payload.clone()).ok()?;
    let remote_id = extract_id(&raw.id)?;

    Some(ReceivableRecord {
        tenant_id: tenant_id.to_string(),
        remote_id,
        due_date: extract_date(&raw.due_date),
        amount: lenient_decimal(&raw.amount, "receivable.amount"),
        status: raw.status,
        customer_name: extract_party(raw.customer, raw.customer_name),
    })
}

/// Order extraction leaves `category` unset on every item; the orders
/// processor fills it in from the product cache afterwards.
pub fn extract_order(tenant_id: &str, payload: &Value) -> Option<OrderRecord> {
    let raw: RemoteOrder = serde_json::from_value(payload.clone()).ok()?;
    let remote_id = extract_id(&raw.id)?;

    let items = raw
        .items
        .into_iter()
        .map(|item| OrderItemRecord {
            product_id: extract_id(&item.product_id),
            description: item.description,
            quantity: lenient_decimal(&item.quantity, "order.item.quantity"),
            unit_price: lenient_decimal(&item.unit_price, "order.item.unit_price"),
            category: None,
        })
        .collect();

    Some(OrderRecord {
        tenant_id: tenant_id.to_string(),
        remote_id,
        order_date: extract_date(&raw.date),
        status: raw.status,
        customer_name: extract_party(raw.customer, raw.customer_name),
        total_amount: lenient_decimal(&raw.total, "order.total"),
        items,
    })
}

pub fn extract_product(payload: &Value) -> Option<ProductRecord> {
    let raw: RemoteProduct = serde_json::from_value(payload.clone()).ok()?;
    let remote_id = extract_id(&raw.id)?;

    Some(ProductRecord {
        remote_id,
        name: raw.name.filter(|n| !n.trim().is_empty()),
        category: raw.category.and_then(ValueOrNamed::into_string),
        unit: raw.unit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_extract_id_variants() {
        assert_eq!(extract_id(&json!(42)), Some("42".to_string()));
        assert_eq!(extract_id(&json!("abc-1")), Some("abc-1".to_string()));
        assert_eq!(extract_id(&json!("  ")), None);
        assert_eq!(extract_id(&json!(null)), None);
        assert_eq!(extract_id(&json!({"nested": true})), None);
    }

    #[test]
    fn test_extract_date_variants() {
        assert_eq!(
            extract_date(&Some("2026-03-01".to_string())),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(
            extract_date(&Some("2026-03-01T10:30:00Z".to_string())),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(
            extract_date(&Some("01/03/2026".to_string())),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert_eq!(extract_date(&Some("soon".to_string())), None);
        assert_eq!(extract_date(&None), None);
    }

    #[test]
    fn test_extract_invoice_full() {
        let payload = json!({
            "id": 981,
            "number": "NF-000981",
            "date": "2026-02-10",
            "total": "R$ 1.250,00",
            "status": "issued",
            "customer": {"name": "ACME Ltda"}
        });

        let record = extract_invoice("t1", &payload).unwrap();
        assert_eq!(record.remote_id, "981");
        assert_eq!(record.total_amount, dec!(1250.00));
        assert_eq!(record.customer_name.as_deref(), Some("ACME Ltda"));
    }

    #[test]
    fn test_extract_invoice_missing_id_is_none() {
        assert!(extract_invoice("t1", &json!({"number": "NF-1"})).is_none());
        assert!(extract_invoice("t1", &json!("not an object")).is_none());
    }

    #[test]
    fn test_extract_invoice_malformed_fields_survive() {
        let payload = json!({
            "id": "77",
            "date": "not a date",
            "total": null,
            "customer": {"name": null}
        });

        let record = extract_invoice("t1", &payload).unwrap();
        assert_eq!(record.issue_date, None);
        assert_eq!(record.total_amount, Decimal::ZERO);
        assert_eq!(record.customer_name, None);
    }

    #[test]
    fn test_extract_order_items() {
        let payload = json!({
            "id": "ord-9",
            "date": "2026-01-05",
            "total": "3.000,00",
            "items": [
                {"product_id": 5, "qty": "2", "price": "1.000,00"},
                {"product_id": "p-6", "description": "Widget", "quantity": 1, "unit_price": 1000}
            ]
        });

        let record = extract_order("t1", &payload).unwrap();
        assert_eq!(record.items.len(), 2);
        assert_eq!(record.items[0].product_id.as_deref(), Some("5"));
        assert_eq!(record.items[0].quantity, dec!(2));
        assert_eq!(record.items[0].unit_price, dec!(1000.00));
        assert_eq!(record.items[1].product_id.as_deref(), Some("p-6"));
        assert!(record.items.iter().all(|i| i.category.is_none()));
    }

    #[test]
    fn test_extract_product_category_shapes() {
        let nested = json!({"id": 1, "name": "Widget", "category": {"name": "Hardware"}});
        let plain = json!({"id": 2, "name": "Gadget", "category": "Electronics"});

        assert_eq!(
            extract_product(&nested).unwrap().category.as_deref(),
            Some("Hardware")
        );
        assert_eq!(
            extract_product(&plain).unwrap().category.as_deref(),
            Some("Electronics")
        );
    }
}
