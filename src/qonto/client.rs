use super::{QontoOperations, TransactionQuery};
use crate::config::{QontoConfig, QontoCredentials};
use crate::error::{AppError, Result};
use crate::models::{BankAccount, BankTransaction};
use crate::qonto::auth::{QontoAuth, build_http_client};
use crate::qonto::types::{OrganizationResponse, QontoBankAccount, TransactionsResponse};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::{Client, Response};
use tracing::{instrument, warn};

pub struct QontoClient {
    client: Client,
    authorization: Authorization,
    api_base_url: String,
}

enum Authorization {
    ApiKey(String),
    Bearer(String),
}

impl QontoClient {
    /// Create a new QontoClient with authenticated access
    ///
    /// With OAuth credentials this validates, refreshes or interactively
    /// obtains tokens as needed.
    #[instrument(name = "Authenticating to Qonto", skip_all)]
    pub async fn new(config: &QontoConfig) -> Result<Self> {
        let credentials = config.credentials().ok_or_else(|| {
            AppError::Config("Qonto credentials are not configured".to_string())
        })?;
        let client = build_http_client(config)?;

        let authorization = match credentials {
            QontoCredentials::ApiKey { login, secret_key } => {
                Authorization::ApiKey(format!("{}:{}", login, secret_key))
            }
            QontoCredentials::OAuth {
                client_id,
                client_secret,
            } => {
                let auth = QontoAuth::new(config, &client_id, &client_secret, client.clone())?;
                let tokens = auth.get_valid_tokens().await?;
                Authorization::Bearer(tokens.access_token)
            }
        };

        Ok(Self {
            client,
            authorization,
            api_base_url: config.api_base_url(),
        })
    }

    /// API-key client against an arbitrary base URL
    #[cfg(test)]
    fn with_base_url(config: &QontoConfig, api_base_url: &str) -> Result<Self> {
        let Some(QontoCredentials::ApiKey { login, secret_key }) = config.credentials() else {
            return Err(AppError::Config(
                "Qonto API key credentials are not configured".to_string(),
            ));
        };

        Ok(Self {
            client: build_http_client(config)?,
            authorization: Authorization::ApiKey(format!("{}:{}", login, secret_key)),
            api_base_url: api_base_url.to_string(),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        let url = format!("{}{}", self.api_base_url, path);
        let request = self.client.get(&url).query(query);

        let request = match &self.authorization {
            Authorization::ApiKey(key) => request.header(reqwest::header::AUTHORIZATION, key),
            Authorization::Bearer(token) => request.bearer_auth(token),
        };

        Ok(request.send().await?)
    }
}

/// Turn a non-2xx response into an error carrying the body
async fn check_status(response: Response, action: &str) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Qonto(format!(
        "Failed to {}: {} - {}",
        action, status, body
    )))
}

/// The account flagged as main, or the first one when none is
fn select_main_account(accounts: Vec<QontoBankAccount>) -> Option<BankAccount> {
    let index = accounts.iter().position(|a| a.main).unwrap_or(0);
    accounts.into_iter().nth(index).map(Into::into)
}

#[async_trait]
impl QontoOperations for QontoClient {
    #[instrument(name = "Fetching main bank account", skip_all)]
    async fn get_main_account(&self) -> Result<BankAccount> {
        let response = self.get("/v2/organization", &[]).await?;
        let response = check_status(response, "get organization").await?;

        let organization: OrganizationResponse = response.json().await?;

        select_main_account(organization.organization.bank_accounts)
            .ok_or_else(|| AppError::Qonto("No bank account found for organization".to_string()))
    }

    #[instrument(name = "Fetching bank transactions", skip_all, fields(side = query.side.as_str()))]
    async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<BankTransaction>> {
        let params = [
            ("iban", query.iban.clone()),
            ("side", query.side.as_str().to_string()),
            (
                "updated_at_from",
                query
                    .updated_at_from
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
            ("per_page", query.per_page.to_string()),
        ];

        let response = self.get("/v2/transactions", &params).await?;
        let response = check_status(response, "list transactions").await?;

        let page: TransactionsResponse = response.json().await?;

        // Only the first page is inspected
        if let Some(meta) = page.meta.as_ref().filter(|m| m.next_page.is_some()) {
            warn!(
                total_count = meta.total_count,
                per_page = query.per_page,
                "More transactions than one page; later pages were not inspected"
            );
        }

        Ok(page.transactions.into_iter().map(Into::into).collect())
    }
}
