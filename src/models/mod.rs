pub mod amount;
pub mod invoice;
pub mod transaction;

pub use invoice::{Invoice, InvoicePatch, InvoiceStatus, ReconciliationMatch};
pub use transaction::{BankAccount, BankTransaction, TransactionSide};
