use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

const CONFIG_DIR_PREFIX: &str = "invoice-reconciler";

const DEFAULT_LOOKBACK_DAYS: u32 = 120;
const DEFAULT_PER_PAGE: u32 = 100;
/// Ten years; Qonto keeps no older transaction history worth scanning
const MAX_LOOKBACK_DAYS: u32 = 3650;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub qonto: QontoConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct QontoConfig {
    /// OAuth application credentials
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// API key credentials, used instead of OAuth when both are set
    #[serde(default)]
    pub login: String,
    #[serde(default)]
    pub secret_key: String,
    /// Routes every call to the Qonto sandbox
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staging_token: Option<String>,
}

/// How the client proves its identity to Qonto
#[derive(Debug, Clone, PartialEq)]
pub enum QontoCredentials {
    ApiKey { login: String, secret_key: String },
    OAuth { client_id: String, client_secret: String },
}

impl QontoConfig {
    pub fn is_sandbox(&self) -> bool {
        self.staging_token.is_some()
    }

    pub fn auth_url(&self) -> String {
        match self.is_sandbox() {
            true => "https://oauth-sandbox.staging.qonto.co".to_string(),
            false => "https://oauth.qonto.com".to_string(),
        }
    }

    pub fn api_base_url(&self) -> String {
        match self.is_sandbox() {
            true => "https://thirdparty-sandbox.staging.qonto.co".to_string(),
            false => "https://thirdparty.qonto.com".to_string(),
        }
    }

    pub fn credentials(&self) -> Option<QontoCredentials> {
        if !self.login.is_empty() && !self.secret_key.is_empty() {
            return Some(QontoCredentials::ApiKey {
                login: self.login.clone(),
                secret_key: self.secret_key.clone(),
            });
        }

        if !self.client_id.is_empty() && !self.client_secret.is_empty() {
            return Some(QontoCredentials::OAuth {
                client_id: self.client_id.clone(),
                client_secret: self.client_secret.clone(),
            });
        }

        None
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Invoice document file, defaults to `invoices.json` in the data dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReconcileConfig {
    /// How far back to look for updated bank transactions
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    /// Page size of the single transaction page fetched
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

fn default_lookback_days() -> u32 {
    DEFAULT_LOOKBACK_DAYS
}

fn default_per_page() -> u32 {
    DEFAULT_PER_PAGE
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;

        if !config_path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {:?}. Please create one.",
                config_path
            )));
        }

        let contents = fs::read_to_string(&config_path)?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        if config.qonto.credentials().is_none() {
            return Err(AppError::Config(
                "Qonto login and secret_key, or client_id and client_secret, must be set in config file"
                    .to_string(),
            ));
        }

        if !(1..=MAX_LOOKBACK_DAYS).contains(&config.reconcile.lookback_days) {
            return Err(AppError::Config(format!(
                "reconcile.lookback_days must be between 1 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }

        if config.reconcile.per_page == 0 {
            return Err(AppError::Config(
                "reconcile.per_page must be greater than zero".to_string(),
            ));
        }

        Ok(config)
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the cache directory path
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }

    /// Get a cache file path
    pub fn cache_file(filename: &str) -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.place_cache_file(filename)
            .map_err(|e| AppError::Config(format!("Failed to create cache file path: {}", e)))
    }

    /// Resolve the invoice store file, creating the data directory if needed
    pub fn store_file(&self) -> Result<PathBuf> {
        if let Some(path) = &self.store.path {
            return Ok(path.clone());
        }

        let xdg = Self::xdg_dirs();
        xdg.place_data_file("invoices.json")
            .map_err(|e| AppError::Config(format!("Failed to create data file path: {}", e)))
    }
}
