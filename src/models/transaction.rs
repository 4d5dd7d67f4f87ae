use crate::qonto::types::{QontoBankAccount, QontoTransaction};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

const COMPLETED_STATUS: &str = "completed";

#[derive(Debug, Clone, PartialEq)]
pub struct BankTransaction {
    pub id: String,
    pub transaction_id: Option<String>,
    pub label: Option<String>,
    pub note: Option<String>,
    pub reference: Option<String>,
    pub status: Option<String>,
    pub amount_cents: Option<i64>,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub settled_at: Option<DateTime<Utc>>,
    pub emitted_at: Option<DateTime<Utc>>,
}

impl BankTransaction {
    pub fn is_completed(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|s| s.trim().eq_ignore_ascii_case(COMPLETED_STATUS))
    }

    /// Amount credited, preferring the minor-unit field when it is set
    pub fn received_amount(&self) -> Decimal {
        match self.amount_cents {
            Some(cents) if cents != 0 => Decimal::new(cents, 2),
            _ => self.amount.unwrap_or(Decimal::ZERO),
        }
    }

    /// All free-text fields a payment reference may appear in
    pub fn haystack(&self) -> String {
        [
            self.label.as_deref(),
            self.note.as_deref(),
            self.reference.as_deref(),
            self.transaction_id.as_deref(),
            Some(self.id.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

impl From<QontoTransaction> for BankTransaction {
    fn from(q: QontoTransaction) -> Self {
        BankTransaction {
            id: q.id,
            transaction_id: q.transaction_id,
            label: q.label,
            note: q.note,
            reference: q.reference,
            status: q.status,
            amount_cents: q.amount_cents,
            amount: q.amount,
            currency: q.currency,
            settled_at: q.settled_at,
            emitted_at: q.emitted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BankAccount {
    pub iban: String,
    pub name: Option<String>,
    pub main: bool,
}

impl From<QontoBankAccount> for BankAccount {
    fn from(q: QontoBankAccount) -> Self {
        BankAccount {
            iban: q.iban,
            name: q.name,
            main: q.main,
        }
    }
}

/// Direction filter for transaction listings; only incoming money is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionSide {
    Credit,
}

impl TransactionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSide::Credit => "credit",
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::dec;

    #[test]
    fn test_received_amount_prefers_cents() {
        let mut tx = test_helpers::mock_transaction("tx_1", "VIR", 50000, "completed");
        tx.amount = Some(dec!(1));
        assert_eq!(tx.received_amount(), dec!(500.00));
    }

    #[test]
    fn test_received_amount_falls_back_to_decimal() {
        let mut tx = test_helpers::mock_transaction("tx_1", "VIR", 0, "completed");
        tx.amount = Some(dec!(400));
        assert_eq!(tx.received_amount(), dec!(400));

        tx.amount_cents = None;
        assert_eq!(tx.received_amount(), dec!(400));

        tx.amount = None;
        assert_eq!(tx.received_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_is_completed_ignores_case() {
        let tx = test_helpers::mock_transaction("tx_1", "VIR", 100, "COMPLETED");
        assert!(tx.is_completed());

        let pending = test_helpers::mock_transaction("tx_2", "VIR", 100, "pending");
        assert!(!pending.is_completed());

        let unknown = BankTransaction {
            status: None,
            ..pending
        };
        assert!(!unknown.is_completed());
    }

    #[test]
    fn test_haystack_joins_free_text_fields() {
        let mut tx = test_helpers::mock_transaction("tx_1", "VIR SEPA", 100, "completed");
        tx.note = Some("acompte".to_string());
        tx.reference = Some("INV-7".to_string());
        assert_eq!(tx.haystack(), "VIR SEPA acompte INV-7 tx_1-ref tx_1");
    }
}
