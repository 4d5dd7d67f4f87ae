mod auth;
mod client;
pub mod types;
pub use auth::clear_tokens as clear_qonto_tokens;
pub use client::QontoClient;

use crate::error::Result;
use crate::models::{BankAccount, BankTransaction, TransactionSide};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter for a single page of bank transactions
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub iban: String,
    pub side: TransactionSide,
    pub updated_at_from: DateTime<Utc>,
    pub per_page: u32,
}

#[async_trait]
pub trait QontoOperations {
    async fn get_main_account(&self) -> Result<BankAccount>;

    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<BankTransaction>>;
}
