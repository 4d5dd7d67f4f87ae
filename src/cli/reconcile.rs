use crate::config::Config;
use crate::error::Result;
use crate::qonto::QontoClient;
use crate::reconcile::{ReconcileOutcome, Reconciler};
use crate::store::JsonFileStore;
use tracing::info;

pub async fn execute(invoice_ids: &[String], dry_run: bool) -> Result<()> {
    let config = Config::load()?;
    let store = JsonFileStore::new(config.store_file()?);
    info!(path = ?store.path(), "Using invoice store");

    let qonto_client = QontoClient::new(&config.qonto).await?;

    let reconciler =
        Reconciler::new(config.reconcile, qonto_client, store).with_dry_run(dry_run);
    let outcomes = reconciler.reconcile_all(invoice_ids).await?;

    print_outcomes(&outcomes)?;
    info!(count = outcomes.len(), dry_run, "Reconciliation completed");

    Ok(())
}

/// One JSON result record per line on stdout
fn print_outcomes(outcomes: &[ReconcileOutcome]) -> Result<()> {
    for outcome in outcomes {
        println!("{}", serde_json::to_string(outcome)?);
    }
    Ok(())
}
