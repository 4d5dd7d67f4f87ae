use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

// https://docs.qonto.com/api-reference/business-api/organizations/show-organization
#[derive(Debug, Deserialize)]
pub(super) struct OrganizationResponse {
    pub(super) organization: QontoOrganization,
}

#[derive(Debug, Deserialize)]
pub(super) struct QontoOrganization {
    #[serde(default)]
    pub(super) bank_accounts: Vec<QontoBankAccount>,
}

#[derive(Debug, Deserialize)]
pub struct QontoBankAccount {
    pub iban: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub main: bool,
}

// https://docs.qonto.com/api-reference/business-api/transactions/list-transactions
#[derive(Debug, Deserialize)]
pub(super) struct TransactionsResponse {
    pub(super) transactions: Vec<QontoTransaction>,
    #[serde(default)]
    pub(super) meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PageMeta {
    #[serde(default)]
    pub(super) next_page: Option<u32>,
    #[serde(default)]
    pub(super) total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct QontoTransaction {
    pub id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    // pending, declined or completed
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub emitted_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::dec;

    #[test]
    fn test_decode_organization() {
        let body = r#"{
            "organization": {
                "slug": "wedding-co-1234",
                "legal_name": "Wedding Co",
                "bank_accounts": [
                    {"slug": "sub", "iban": "FR7616798000010000000000001", "name": "Savings", "main": false, "balance": 10.5},
                    {"slug": "main", "iban": "FR7616798000010000000000002", "name": "Main", "main": true, "balance_cents": 1050}
                ]
            }
        }"#;

        let response: OrganizationResponse = serde_json::from_str(body).unwrap();
        let accounts = response.organization.bank_accounts;
        assert_eq!(accounts.len(), 2);
        assert!(accounts[1].main);
        assert_eq!(accounts[1].iban, "FR7616798000010000000000002");
    }

    #[test]
    fn test_decode_transactions() {
        let body = r#"{
            "transactions": [
                {
                    "id": "7b7a5ed6-3903-4782-889d-b4f64bd7bef9",
                    "transaction_id": "wedding-co-1234-1-transaction-42",
                    "amount": 500.0,
                    "amount_cents": 50000,
                    "side": "credit",
                    "operation_type": "income",
                    "currency": "EUR",
                    "label": "VIR INV-2024-007",
                    "note": null,
                    "reference": "INV-2024-007",
                    "settled_at": "2024-06-01T10:00:00.000Z",
                    "emitted_at": "2024-05-31T08:12:00.000Z",
                    "updated_at": "2024-06-01T10:00:01.000Z",
                    "status": "completed"
                }
            ],
            "meta": {"current_page": 1, "next_page": 2, "prev_page": null, "total_pages": 2, "total_count": 101, "per_page": 100}
        }"#;

        let response: TransactionsResponse = serde_json::from_str(body).unwrap();
        let tx = &response.transactions[0];
        assert_eq!(tx.amount_cents, Some(50000));
        assert_eq!(tx.amount, Some(dec!(500)));
        assert_eq!(tx.status.as_deref(), Some("completed"));
        assert_eq!(tx.note, None);
        assert!(tx.settled_at.is_some());

        let meta = response.meta.unwrap();
        assert_eq!(meta.next_page, Some(2));
        assert_eq!(meta.total_count, Some(101));
    }
}
