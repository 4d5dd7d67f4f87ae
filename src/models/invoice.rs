use crate::error::{AppError, Result};
use crate::models::amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Invoice document as stored by the dashboard.
///
/// Only the fields reconciliation reads are modelled; everything else in the
/// document is left to the store and survives merges untouched.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: InvoiceKind,
    #[serde(rename = "totalTTC", default, deserialize_with = "amount::lenient_option")]
    pub total_ttc: Option<Decimal>,
    #[serde(default, deserialize_with = "amount::lenient_option")]
    pub amount: Option<Decimal>,
    #[serde(default, deserialize_with = "amount::lenient")]
    pub paid: Decimal,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reconciled_transaction_ids: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Invoice {
    pub fn from_document(id: &str, document: Value) -> Result<Self> {
        let mut invoice: Invoice = serde_json::from_value(document)
            .map_err(|e| AppError::Store(format!("Invalid invoice document {}: {}", id, e)))?;
        invoice.id = id.to_string();
        Ok(invoice)
    }

    /// Gross total owed, falling back to the generic amount field
    pub fn total_due(&self) -> Decimal {
        self.total_ttc.or(self.amount).unwrap_or(Decimal::ZERO)
    }

    pub fn remaining(&self) -> Decimal {
        self.total_due() - self.paid
    }

    /// The payment reference, if set to something other than blanks
    pub fn payment_reference(&self) -> Option<&str> {
        self.payment_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn is_deposit(&self) -> bool {
        self.kind == InvoiceKind::Deposit
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum InvoiceKind {
    Deposit,
    #[default]
    Standard,
}

impl From<Option<String>> for InvoiceKind {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(kind) if kind.trim().eq_ignore_ascii_case("deposit") => InvoiceKind::Deposit,
            _ => InvoiceKind::Standard,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", from = "Option<String>")]
pub enum InvoiceStatus {
    #[default]
    Pending,
    Partial,
    Paid,
}

impl From<Option<String>> for InvoiceStatus {
    fn from(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("paid") => InvoiceStatus::Paid,
            Some(s) if s.eq_ignore_ascii_case("partial") => InvoiceStatus::Partial,
            _ => InvoiceStatus::Pending,
        }
    }
}

/// Bank transaction details recorded on the invoice once it is reconciled
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationMatch {
    pub transaction_id: String,
    pub settled_at: Option<DateTime<Utc>>,
    pub emitted_at: Option<DateTime<Utc>>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Option<String>,
    pub label: Option<String>,
    pub note: Option<String>,
    pub reference: Option<String>,
    pub matched_at: DateTime<Utc>,
}

/// Fields merged into the invoice document after an accepted match
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePatch {
    #[serde(with = "rust_decimal::serde::float")]
    pub paid: Decimal,
    pub status: InvoiceStatus,
    pub payment_method: String,
    pub payment_provider: String,
    pub reconciliation_match: ReconciliationMatch,
    pub reconciled_transaction_ids: Vec<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_received: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl InvoicePatch {
    pub fn into_fields(self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            other => Err(AppError::Store(format!(
                "Invoice patch did not serialize to an object: {}",
                other
            ))),
        }
    }
}
