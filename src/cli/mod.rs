mod auth;
mod reconcile;
mod show;

use crate::error::Result;
use clap::{Parser, Subcommand};

pub use auth::AuthProvider;
pub use show::ShowResource;

#[derive(Parser, Debug)]
#[command(name = "invoice-reconciler")]
#[command(about = "Reconcile invoices against incoming Qonto bank transfers", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Reconcile {
                invoice_ids,
                dry_run,
            } => reconcile::execute(invoice_ids, *dry_run).await,
            Commands::Auth { provider, reset } => provider.execute(*reset).await,
            Commands::Show { resource } => resource.execute().await,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match invoices against recent incoming transfers and record payments
    Reconcile {
        /// Invoice ids to reconcile, in order
        #[arg(required = true)]
        invoice_ids: Vec<String>,

        /// Report outcomes without updating invoices
        #[arg(long)]
        dry_run: bool,
    },
    Auth {
        #[command(subcommand)]
        provider: AuthProvider,

        /// Discard cached tokens and authenticate again
        #[arg(long, global = true)]
        reset: bool,
    },
    Show {
        #[command(subcommand)]
        resource: ShowResource,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reconcile() {
        let cli = Cli::try_parse_from([
            "invoice-reconciler",
            "reconcile",
            "inv_1",
            "inv_2",
            "--dry-run",
        ])
        .unwrap();

        match cli.command {
            Commands::Reconcile {
                invoice_ids,
                dry_run,
            } => {
                assert_eq!(invoice_ids, vec!["inv_1", "inv_2"]);
                assert!(dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_reconcile_requires_an_invoice() {
        assert!(Cli::try_parse_from(["invoice-reconciler", "reconcile"]).is_err());
    }

    #[test]
    fn test_parse_auth_reset() {
        let cli =
            Cli::try_parse_from(["invoice-reconciler", "auth", "qonto", "--reset"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Auth {
                provider: AuthProvider::Qonto,
                reset: true
            }
        ));
    }
}
