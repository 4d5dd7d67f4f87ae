use crate::config::ReconcileConfig;
use crate::error::{AppError, Result};
use crate::models::{
    BankTransaction, Invoice, InvoicePatch, InvoiceStatus, ReconciliationMatch, TransactionSide,
};
use crate::qonto::{QontoOperations, TransactionQuery};
use crate::reconcile::matcher::{self, AcceptedMatch, MatchDecision};
use crate::store::InvoiceOperations;
use chrono::{DateTime, Duration, Utc};
use indicatif::ProgressStyle;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{Span, debug, info, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const PAYMENT_METHOD: &str = "transfer";
const PAYMENT_PROVIDER: &str = "qonto";

/// Result of one reconciliation request
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ReconcileOutcome {
    Rejected(Rejection),
    Report(ReconcileReport),
}

/// The invoice cannot be reconciled as stored
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub invoice_id: String,
    pub error: RejectionReason,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InvoiceNotFound,
    MissingPaymentReference,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub invoice_id: String,
    pub status: InvoiceStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub paid: Decimal,
    pub matched: Option<MatchedTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ReconcileMessage>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub expected: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub received: Option<Decimal>,
}

/// Non-fatal reasons an invoice was left untouched
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMessage {
    AlreadyPaid,
    NoMatchingTransaction,
    TransactionNotCompletedYet,
    DepositRequiresExactAmount,
}

/// Preview of the transaction an invoice was matched against
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchedTransaction {
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub settled_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl From<&BankTransaction> for MatchedTransaction {
    fn from(t: &BankTransaction) -> Self {
        MatchedTransaction {
            id: t.id.clone(),
            amount: t.received_amount(),
            settled_at: t.settled_at,
            status: t.status.clone(),
        }
    }
}

impl ReconcileReport {
    fn unchanged(invoice: &Invoice, message: ReconcileMessage) -> Self {
        ReconcileReport {
            invoice_id: invoice.id.clone(),
            status: invoice.status,
            paid: invoice.paid,
            matched: None,
            message: Some(message),
            expected: None,
            received: None,
        }
    }
}

pub struct Reconciler<QC, IS> {
    config: ReconcileConfig,
    qonto_client: QC,
    invoice_store: IS,
    dry_run: bool,
}

impl<QC, IS> Reconciler<QC, IS>
where
    QC: QontoOperations + Sync,
    IS: InvoiceOperations + Sync,
{
    pub fn new(config: ReconcileConfig, qonto_client: QC, invoice_store: IS) -> Self {
        Self {
            config,
            qonto_client,
            invoice_store,
            dry_run: false,
        }
    }

    /// Compute outcomes without writing to the invoice store
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[instrument(name = "Reconcile", skip_all)]
    pub async fn reconcile_all(&self, invoice_ids: &[String]) -> Result<Vec<ReconcileOutcome>> {
        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_message("Reconciling invoices");
        span.pb_set_length(invoice_ids.len() as u64);

        let mut outcomes = Vec::with_capacity(invoice_ids.len());
        for invoice_id in invoice_ids {
            outcomes.push(self.reconcile(invoice_id).await?);
            span.pb_inc(1);
        }

        Ok(outcomes)
    }

    #[instrument(name = "Reconciling invoice", skip(self))]
    pub async fn reconcile(&self, invoice_id: &str) -> Result<ReconcileOutcome> {
        let Some(invoice) = self.invoice_store.get_invoice(invoice_id).await? else {
            return Ok(rejected(invoice_id, RejectionReason::InvoiceNotFound));
        };

        if invoice.payment_reference().is_none() {
            return Ok(rejected(invoice_id, RejectionReason::MissingPaymentReference));
        }

        if invoice.remaining() <= Decimal::ZERO {
            debug!("Invoice already settled, skipping bank lookup");
            return Ok(ReconcileOutcome::Report(ReconcileReport::unchanged(
                &invoice,
                ReconcileMessage::AlreadyPaid,
            )));
        }

        let updated_at_from = Duration::try_days(self.config.lookback_days as i64)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .ok_or_else(|| {
                AppError::Config(format!(
                    "Lookback of {} days is out of range",
                    self.config.lookback_days
                ))
            })?;

        let account = self.qonto_client.get_main_account().await?;
        let query = TransactionQuery {
            iban: account.iban,
            side: TransactionSide::Credit,
            updated_at_from,
            per_page: self.config.per_page,
        };
        let transactions = self.qonto_client.list_transactions(&query).await?;

        let report = match matcher::evaluate(&invoice, &transactions) {
            MatchDecision::NoMatch => {
                ReconcileReport::unchanged(&invoice, ReconcileMessage::NoMatchingTransaction)
            }
            MatchDecision::NotCompleted(primary) => ReconcileReport {
                matched: Some(primary.into()),
                ..ReconcileReport::unchanged(&invoice, ReconcileMessage::TransactionNotCompletedYet)
            },
            MatchDecision::DepositAmountMismatch {
                primary,
                expected,
                received,
            } => ReconcileReport {
                matched: Some(primary.into()),
                expected: Some(expected),
                received: Some(received),
                ..ReconcileReport::unchanged(&invoice, ReconcileMessage::DepositRequiresExactAmount)
            },
            MatchDecision::Accepted(accepted) => self.apply(&invoice, accepted).await?,
        };

        info!(
            status = ?report.status,
            paid = %report.paid,
            message = ?report.message,
            "Invoice reconciled"
        );

        Ok(ReconcileOutcome::Report(report))
    }

    async fn apply(&self, invoice: &Invoice, accepted: AcceptedMatch<'_>) -> Result<ReconcileReport> {
        let primary = accepted.primary;
        let now = Utc::now();

        let mut reconciled_ids = invoice.reconciled_transaction_ids.clone();
        for t in &accepted.completed {
            if !reconciled_ids.contains(&t.id) {
                reconciled_ids.push(t.id.clone());
            }
        }

        let patch = InvoicePatch {
            paid: accepted.new_paid,
            status: accepted.new_status,
            payment_method: PAYMENT_METHOD.to_string(),
            payment_provider: PAYMENT_PROVIDER.to_string(),
            reconciliation_match: ReconciliationMatch {
                transaction_id: primary.id.clone(),
                settled_at: primary.settled_at,
                emitted_at: primary.emitted_at,
                amount: accepted.received_on_match,
                currency: primary.currency.clone(),
                label: primary.label.clone(),
                note: primary.note.clone(),
                reference: primary.reference.clone(),
                matched_at: now,
            },
            reconciled_transaction_ids: reconciled_ids,
            total_received: accepted.total_received,
            updated_at: now,
        };

        if self.dry_run {
            debug!("Dry run, invoice not updated");
        } else {
            self.invoice_store
                .merge_invoice(&invoice.id, patch.into_fields()?)
                .await?;
        }

        Ok(ReconcileReport {
            invoice_id: invoice.id.clone(),
            status: accepted.new_status,
            paid: accepted.new_paid,
            matched: Some(primary.into()),
            message: None,
            expected: None,
            received: None,
        })
    }
}

fn rejected(invoice_id: &str, reason: RejectionReason) -> ReconcileOutcome {
    ReconcileOutcome::Rejected(Rejection {
        invoice_id: invoice_id.to_string(),
        error: reason,
    })
}
