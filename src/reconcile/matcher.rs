use crate::models::{BankTransaction, Invoice, InvoiceStatus};
use rust_decimal::Decimal;
use rust_decimal::prelude::dec;
use tracing::instrument;

/// Largest difference still considered an exact deposit payment
const DEPOSIT_TOLERANCE: Decimal = dec!(0.01);

/// Outcome of matching one invoice against a page of bank transactions
#[derive(Debug, PartialEq)]
pub enum MatchDecision<'a> {
    /// No transaction mentions the payment reference
    NoMatch,
    /// The best candidate has not settled yet
    NotCompleted(&'a BankTransaction),
    /// Deposits must be paid exactly
    DepositAmountMismatch {
        primary: &'a BankTransaction,
        expected: Decimal,
        received: Decimal,
    },
    Accepted(AcceptedMatch<'a>),
}

#[derive(Debug, PartialEq)]
pub struct AcceptedMatch<'a> {
    pub primary: &'a BankTransaction,
    /// Every completed candidate, in gateway order
    pub completed: Vec<&'a BankTransaction>,
    pub received_on_match: Decimal,
    pub total_received: Decimal,
    pub new_paid: Decimal,
    pub new_status: InvoiceStatus,
}

/// Upper-case, split on anything that is not a letter or digit, and join the
/// pieces with single spaces.
pub fn normalize_reference(text: &str) -> String {
    text.to_uppercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transactions whose free-text fields contain `reference`, in gateway order
pub fn find_candidates<'a>(
    reference: &str,
    transactions: &'a [BankTransaction],
) -> Vec<&'a BankTransaction> {
    let needle = normalize_reference(reference);
    if needle.is_empty() {
        return Vec::new();
    }

    transactions
        .iter()
        .filter(|t| normalize_reference(&t.haystack()).contains(&needle))
        .collect()
}

/// Decide how `transactions` settle `invoice`.
///
/// Completed candidates take priority over in-flight ones; amounts of all
/// completed candidates are summed so split transfers count together.
#[instrument(name = "Matching transactions", skip_all, fields(invoice_id = %invoice.id))]
pub fn evaluate<'a>(invoice: &Invoice, transactions: &'a [BankTransaction]) -> MatchDecision<'a> {
    let Some(reference) = invoice.payment_reference() else {
        return MatchDecision::NoMatch;
    };

    let candidates = find_candidates(reference, transactions);
    let completed: Vec<&BankTransaction> = candidates
        .iter()
        .copied()
        .filter(|t| t.is_completed())
        .collect();

    let Some(primary) = completed.first().or(candidates.first()).copied() else {
        return MatchDecision::NoMatch;
    };

    if primary.status.is_some() && !primary.is_completed() {
        return MatchDecision::NotCompleted(primary);
    }

    let received_on_match = primary.received_amount();
    let total_received: Decimal = completed.iter().map(|t| t.received_amount()).sum();
    let total_due = invoice.total_due();

    if invoice.is_deposit() && (total_received - total_due).abs() >= DEPOSIT_TOLERANCE {
        return MatchDecision::DepositAmountMismatch {
            primary,
            expected: total_due,
            received: total_received,
        };
    }

    let new_paid = invoice.paid.max(total_received).min(total_due);
    // A paid flag set by hand is never downgraded
    let new_status = if new_paid >= total_due || invoice.status == InvoiceStatus::Paid {
        InvoiceStatus::Paid
    } else if new_paid > Decimal::ZERO {
        InvoiceStatus::Partial
    } else {
        invoice.status
    };

    MatchDecision::Accepted(AcceptedMatch {
        primary,
        completed,
        received_on_match,
        total_received,
        new_paid,
        new_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::invoice::InvoiceKind;
    use crate::models::invoice::test_helpers::mock_invoice;
    use crate::models::transaction::test_helpers::mock_transaction;

    fn standard_invoice(total: Decimal, paid: Decimal, reference: &str) -> Invoice {
        mock_invoice("inv_1", InvoiceKind::Standard, total, paid, Some(reference))
    }

    fn accepted<'a>(decision: MatchDecision<'a>) -> AcceptedMatch<'a> {
        match decision {
            MatchDecision::Accepted(m) => m,
            other => panic!("expected accepted match, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_reference() {
        assert_eq!(normalize_reference("  inv-2024/007 "), "INV 2024 007");
        assert_eq!(normalize_reference("Virement\t\tINV   123"), "VIREMENT INV 123");
        assert_eq!(normalize_reference("--"), "");
    }

    #[test]
    fn test_match_ignores_case_and_separators() {
        let txs = vec![mock_transaction("tx_1", "virement inv-123 merci", 100, "completed")];
        let candidates = find_candidates("INV 123", &txs);
        assert_eq!(candidates, vec![&txs[0]]);
    }

    #[test]
    fn test_match_searches_note_and_reference() {
        let mut in_note = mock_transaction("tx_1", "VIR SEPA", 100, "completed");
        in_note.note = Some("Facture inv-9".to_string());
        let mut in_reference = mock_transaction("tx_2", "VIR SEPA", 100, "completed");
        in_reference.reference = Some("INV-9".to_string());
        let unrelated = mock_transaction("tx_3", "VIR SEPA", 100, "completed");

        let txs = vec![in_note, in_reference, unrelated];
        let ids: Vec<&str> = find_candidates("INV-9", &txs)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(ids, vec!["tx_1", "tx_2"]);
    }

    #[test]
    fn test_blank_reference_matches_nothing() {
        let txs = vec![mock_transaction("tx_1", "VIR", 100, "completed")];
        assert!(find_candidates(" - ", &txs).is_empty());
    }

    #[test]
    fn test_full_payment() {
        let invoice = standard_invoice(dec!(500), dec!(0), "INV-2024-007");
        let txs = vec![mock_transaction("tx_1", "VIR INV-2024-007", 50000, "completed")];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.primary.id, "tx_1");
        assert_eq!(m.received_on_match, dec!(500));
        assert_eq!(m.new_paid, dec!(500));
        assert_eq!(m.new_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_no_candidate() {
        let invoice = standard_invoice(dec!(500), dec!(0), "INV-2024-007");
        let txs = vec![mock_transaction("tx_1", "VIR INV-2024-008", 50000, "completed")];
        assert_eq!(evaluate(&invoice, &txs), MatchDecision::NoMatch);
    }

    #[test]
    fn test_completed_preferred_regardless_of_order() {
        let invoice = standard_invoice(dec!(500), dec!(0), "INV-7");
        let txs = vec![
            mock_transaction("tx_pending", "INV-7", 50000, "pending"),
            mock_transaction("tx_done", "INV-7", 50000, "completed"),
            mock_transaction("tx_done_later", "INV-7", 100, "completed"),
        ];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.primary.id, "tx_done");
    }

    #[test]
    fn test_not_completed_yet() {
        let invoice = standard_invoice(dec!(500), dec!(0), "INV-7");
        let txs = vec![mock_transaction("tx_1", "INV-7", 50000, "processing")];

        assert_eq!(
            evaluate(&invoice, &txs),
            MatchDecision::NotCompleted(&txs[0])
        );
    }

    #[test]
    fn test_unknown_status_is_not_rejected() {
        let invoice = standard_invoice(dec!(500), dec!(100), "INV-7");
        let mut tx = mock_transaction("tx_1", "INV-7", 50000, "completed");
        tx.status = None;
        let txs = vec![tx];

        let m = accepted(evaluate(&invoice, &txs));
        assert!(m.completed.is_empty());
        assert_eq!(m.total_received, Decimal::ZERO);
        assert_eq!(m.new_paid, dec!(100));
        assert_eq!(m.new_status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_partial_transfers_are_summed() {
        let invoice = standard_invoice(dec!(1000), dec!(0), "INV-42");
        let txs = vec![
            mock_transaction("tx_1", "INV-42 1/2", 30000, "completed"),
            mock_transaction("tx_2", "INV-42 2/2", 30000, "completed"),
            mock_transaction("tx_3", "INV-42 3/3", 40000, "declined"),
        ];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.received_on_match, dec!(300));
        assert_eq!(m.total_received, dec!(600));
        assert_eq!(m.new_paid, dec!(600));
        assert_eq!(m.new_status, InvoiceStatus::Partial);
        assert_eq!(m.completed.len(), 2);
    }

    #[test]
    fn test_paid_never_exceeds_total() {
        let invoice = standard_invoice(dec!(500), dec!(0), "INV-7");
        let txs = vec![mock_transaction("tx_1", "INV-7", 75000, "completed")];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.total_received, dec!(750));
        assert_eq!(m.new_paid, dec!(500));
        assert_eq!(m.new_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_paid_never_decreases() {
        let invoice = standard_invoice(dec!(1000), dec!(700), "INV-7");
        let txs = vec![mock_transaction("tx_1", "INV-7", 20000, "completed")];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.new_paid, dec!(700));
        assert_eq!(m.new_status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_paid_status_never_downgraded() {
        let mut invoice = standard_invoice(dec!(500), dec!(0), "INV-7");
        invoice.status = InvoiceStatus::Paid;
        let txs = vec![mock_transaction("tx_1", "INV-7", 10000, "completed")];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.new_paid, dec!(100));
        assert_eq!(m.new_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_deposit_requires_exact_amount() {
        let invoice = mock_invoice(
            "inv_1",
            InvoiceKind::Deposit,
            dec!(1000),
            dec!(0),
            Some("DEP-55"),
        );
        let mut tx = mock_transaction("tx_1", "DEP-55", 0, "completed");
        tx.amount = Some(dec!(400));
        let txs = vec![tx];

        assert_eq!(
            evaluate(&invoice, &txs),
            MatchDecision::DepositAmountMismatch {
                primary: &txs[0],
                expected: dec!(1000),
                received: dec!(400),
            }
        );
    }

    #[test]
    fn test_deposit_rejects_overpayment() {
        let invoice = mock_invoice("inv_1", InvoiceKind::Deposit, dec!(1000), dec!(0), Some("DEP-55"));
        let txs = vec![mock_transaction("tx_1", "DEP-55", 100001, "completed")];

        assert!(matches!(
            evaluate(&invoice, &txs),
            MatchDecision::DepositAmountMismatch { .. }
        ));
    }

    #[test]
    fn test_deposit_exact_amount_accepted() {
        let invoice = mock_invoice("inv_1", InvoiceKind::Deposit, dec!(1000), dec!(0), Some("DEP-55"));
        let mut tx = mock_transaction("tx_1", "DEP-55", 0, "completed");
        tx.amount = Some(dec!(999.995));
        let txs = vec![tx];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.new_paid, dec!(999.995));
        assert_eq!(m.new_status, InvoiceStatus::Partial);
    }

    #[test]
    fn test_deposit_split_transfers_summing_to_total() {
        let invoice = mock_invoice("inv_1", InvoiceKind::Deposit, dec!(1000), dec!(0), Some("DEP-55"));
        let txs = vec![
            mock_transaction("tx_1", "DEP-55", 60000, "completed"),
            mock_transaction("tx_2", "DEP-55", 40000, "completed"),
        ];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.new_paid, dec!(1000));
        assert_eq!(m.new_status, InvoiceStatus::Paid);
    }

    #[test]
    fn test_reference_prefix_of_another_reference() {
        // INV-1 is contained in INV-12, so both transfers are credited
        let invoice = standard_invoice(dec!(1000), dec!(0), "INV-1");
        let txs = vec![
            mock_transaction("tx_1", "VIR INV-1", 20000, "completed"),
            mock_transaction("tx_12", "VIR INV-12", 50000, "completed"),
        ];

        let m = accepted(evaluate(&invoice, &txs));
        assert_eq!(m.total_received, dec!(700));
        assert_eq!(m.new_paid, dec!(700));
    }

    #[test]
    fn test_reference_does_not_match_across_words() {
        // Separators are kept as word boundaries, digits are not merged
        let invoice = standard_invoice(dec!(1000), dec!(0), "INV-12");
        let txs = vec![mock_transaction("tx_1", "VIR INV-1 2", 20000, "completed")];

        assert_eq!(evaluate(&invoice, &txs), MatchDecision::NoMatch);
    }
}
