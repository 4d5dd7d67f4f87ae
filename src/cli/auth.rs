use crate::config::Config;
use crate::error::Result;
use crate::qonto::{QontoClient, QontoOperations, clear_qonto_tokens};
use clap::Subcommand;
use tracing::info;

#[derive(Subcommand, Debug)]
pub enum AuthProvider {
    /// Authenticate with Qonto
    Qonto,
}

impl AuthProvider {
    pub async fn execute(&self, reset: bool) -> Result<()> {
        match self {
            AuthProvider::Qonto => authenticate_qonto(reset).await,
        }
    }
}

async fn authenticate_qonto(reset: bool) -> Result<()> {
    if reset {
        clear_qonto_tokens()?;
    }

    let config = Config::load()?;
    let client = QontoClient::new(&config.qonto).await?;
    let account = client.get_main_account().await?;

    info!(iban = %account.iban, name = ?account.name, "Qonto authentication verified");

    Ok(())
}
