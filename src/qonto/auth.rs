use crate::config::{Config, QontoConfig};
use crate::error::{AppError, Result};
use oauth2::{
    AuthUrl, AuthorizationCode, Client, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, PkceCodeChallenge, RedirectUrl, RefreshToken, Scope, StandardRevocableToken,
    TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use tiny_http::{Response, Server};
use tracing::{debug, info, instrument};
use url::Url;

const QONTO_SCOPES: &[&str] = &["offline_access", "organization.read"];
const CALLBACK_PORT: u16 = 3000;
const STAGING_TOKEN_HEADER: &str = "X-Qonto-Staging-Token";
const TOKEN_CACHE_FILE: &str = "qonto_tokens.json";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub(super) struct QontoTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry time as seconds since Unix epoch
    pub expires_at: i64,
}

impl QontoTokens {
    /// Expired, or expiring within the next 5 minutes
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.expires_at < (now + 300)
    }
}

type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// HTTP client shared by the OAuth exchange and the API calls.
///
/// Sandbox requests must all carry the staging token, so it goes into the
/// default headers rather than onto each request.
pub(super) fn build_http_client(config: &QontoConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(staging_token) = &config.staging_token {
        let value = HeaderValue::from_str(staging_token)
            .map_err(|e| AppError::Config(format!("Invalid staging token: {}", e)))?;
        headers.insert(STAGING_TOKEN_HEADER, value);
    }

    reqwest::ClientBuilder::new()
        .redirect(Policy::none())
        .default_headers(headers)
        .build()
        .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))
}

pub(super) struct QontoAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl QontoAuth {
    pub(super) fn new(
        config: &QontoConfig,
        client_id: &str,
        client_secret: &str,
        http_client: reqwest::Client,
    ) -> Result<Self> {
        let base_auth_url = config.auth_url();
        let auth_url = AuthUrl::new(format!("{}/oauth2/auth", base_auth_url))
            .map_err(|e| AppError::Auth(format!("Invalid auth URL: {}", e)))?;
        let token_url = TokenUrl::new(format!("{}/oauth2/token", base_auth_url))
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let redirect_url = format!("http://localhost:{}/callback", CALLBACK_PORT);
        let client = BasicClient::new(ClientId::new(client_id.to_string()))
            .set_client_secret(ClientSecret::new(client_secret.to_string()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url)
            .set_redirect_uri(
                RedirectUrl::new(redirect_url)
                    .map_err(|e| AppError::Auth(format!("Invalid redirect URL: {}", e)))?,
            );

        Ok(Self {
            client,
            http_client,
        })
    }

    async fn authenticate(&self) -> Result<QontoTokens> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let scopes = QONTO_SCOPES
            .iter()
            .map(|s| Scope::new(s.to_string()))
            .collect::<Vec<Scope>>();
        let (auth_url, csrf_token) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(scopes)
            .set_pkce_challenge(pkce_challenge)
            .url();

        let bind_addr = format!("127.0.0.1:{}", CALLBACK_PORT);
        let server = Server::http(&bind_addr)
            .map_err(|e| AppError::Auth(format!("Failed to bind to {}: {}", bind_addr, e)))?;

        println!("Open this URL in your browser:\n{}", auth_url);
        println!();
        println!("Waiting for authorization...");

        let request = server
            .recv()
            .map_err(|e| AppError::Auth(format!("Failed to receive request: {}", e)))?;

        let callback_url = format!("http://localhost:{}{}", CALLBACK_PORT, request.url());
        let (code, state) = parse_callback(&callback_url)?;

        if state != *csrf_token.secret() {
            return Err(AppError::Auth("CSRF token mismatch".to_string()));
        }

        request
            .respond(Response::from_string(
                "Qonto authorization complete. You can close this window.",
            ))
            .map_err(|e| AppError::Auth(format!("Failed to send response: {}", e)))?;

        let token_result = self
            .client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(pkce_verifier)
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to exchange code: {:?}", e)))?;

        Self::parse_and_save_tokens(token_result, None)
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> Result<QontoTokens> {
        let token_result = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Failed to refresh token: {:?}", e)))?;

        Self::parse_and_save_tokens(token_result, Some(refresh_token))
    }

    /// Build tokens from a token response and persist them.
    ///
    /// Refresh responses may omit the refresh token, in which case the one
    /// that was just used is kept.
    fn parse_and_save_tokens(
        token_result: BasicTokenResponse,
        fallback_refresh_token: Option<&str>,
    ) -> Result<QontoTokens> {
        let refresh_token = match (token_result.refresh_token(), fallback_refresh_token) {
            (Some(token), _) => token.secret().clone(),
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => return Err(AppError::Auth("No refresh token received".to_string())),
        };

        let expires_in = token_result
            .expires_in()
            .map(|d| d.as_secs() as i64)
            .unwrap_or(3600);

        let tokens = QontoTokens {
            access_token: token_result.access_token().secret().clone(),
            refresh_token,
            expires_at: chrono::Utc::now().timestamp() + expires_in,
        };

        save_tokens(&tokens)?;

        Ok(tokens)
    }

    /// Get a usable access token, refreshing or re-authenticating as needed
    pub(super) async fn get_valid_tokens(&self) -> Result<QontoTokens> {
        let Some(tokens) = load_tokens()? else {
            debug!("No cached tokens found, authenticating with Qonto...");
            return self.authenticate().await;
        };

        if !tokens.is_expired() {
            debug!("Using cached Qonto tokens");
            return Ok(tokens);
        }

        debug!("Access token expired, refreshing...");

        match self.refresh_access_token(&tokens.refresh_token).await {
            Ok(refreshed_tokens) => {
                debug!("Token refresh successful");
                Ok(refreshed_tokens)
            }
            Err(e) => {
                debug!("Token refresh failed ({}), re-authenticating...", e);
                self.authenticate().await
            }
        }
    }
}

/// Extract `(code, state)` from the OAuth redirect
fn parse_callback(callback_url: &str) -> Result<(String, String)> {
    let url = Url::parse(callback_url)
        .map_err(|e| AppError::Auth(format!("Failed to parse callback URL: {}", e)))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    };

    if let Some(error) = param("error") {
        return Err(AppError::Auth(format!("Authorization denied: {}", error)));
    }

    let code = param("code").ok_or_else(|| AppError::Auth("No code in callback".to_string()))?;
    let state =
        param("state").ok_or_else(|| AppError::Auth("No state in callback".to_string()))?;

    Ok((code, state))
}

fn token_cache_path() -> Result<PathBuf> {
    Config::cache_file(TOKEN_CACHE_FILE)
}

fn load_tokens() -> Result<Option<QontoTokens>> {
    let token_path = token_cache_path()?;

    if !token_path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(&token_path)
        .map_err(|e| AppError::Auth(format!("Failed to read tokens file: {}", e)))?;

    let tokens: QontoTokens = serde_json::from_str(&contents)
        .map_err(|e| AppError::Auth(format!("Failed to parse tokens: {}", e)))?;

    Ok(Some(tokens))
}

fn save_tokens(tokens: &QontoTokens) -> Result<()> {
    let token_path = token_cache_path()?;

    if let Some(parent) = token_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Auth(format!("Failed to create token cache directory: {}", e))
        })?;
    }

    let contents = serde_json::to_string_pretty(tokens)
        .map_err(|e| AppError::Auth(format!("Failed to serialize tokens: {}", e)))?;

    // Owner-only from creation
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(&token_path)
        .map_err(|e| AppError::Auth(format!("Failed to create tokens file: {}", e)))?;

    file.write_all(contents.as_bytes())
        .map_err(|e| AppError::Auth(format!("Failed to write tokens file: {}", e)))?;

    Ok(())
}

/// Delete the cached Qonto OAuth tokens
#[instrument(name = "Clearing auth tokens for Qonto", skip_all)]
pub fn clear_tokens() -> Result<()> {
    let token_path = token_cache_path()?;

    if !token_path.exists() {
        debug!("No Qonto tokens to clear");
        return Ok(());
    }

    fs::remove_file(&token_path)
        .map_err(|e| AppError::Auth(format!("Failed to delete tokens file: {}", e)))?;
    info!("Cleared Qonto cached tokens");

    Ok(())
}
