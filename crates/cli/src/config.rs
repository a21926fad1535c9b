//! `ordercheck.toml` loading, flag overrides, and credential resolution.

use std::path::{Path, PathBuf};

use ordercheck_provider::{DetailPolicy, ProviderConfig};
use ordercheck_recon::{LedgerConfig, ReconConfig};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::exit_codes::{EXIT_CONFIG, EXIT_MISSING_CREDENTIALS};
use crate::CliError;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "ordercheck.toml";

pub const API_KEY_ENV: &str = "ORDERCHECK_API_KEY";

/// Whole config file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub reconcile: ReconConfig,
    pub ledger: LedgerConfig,
}

/// Command-line values that replace file values when present.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub tolerance: Option<Decimal>,
    pub page_size: Option<u32>,
    pub max_pages: Option<u32>,
    pub workers: Option<usize>,
    pub detail_policy: Option<DetailPolicy>,
    pub base_url: Option<String>,
}

fn config_err(msg: impl Into<String>) -> CliError {
    CliError {
        code: EXIT_CONFIG,
        message: msg.into(),
        hint: None,
    }
}

impl AppConfig {
    pub fn from_toml(input: &str) -> Result<Self, CliError> {
        let config: AppConfig =
            toml::from_str(input).map_err(|e| config_err(format!("config parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CliError> {
        self.provider
            .validate()
            .map_err(|e| config_err(format!("[provider] {e}")))?;
        self.reconcile
            .validate()
            .map_err(|e| config_err(format!("[reconcile] {e}")))?;
        self.ledger
            .validate()
            .map_err(|e| config_err(format!("[ledger] {e}")))?;
        Ok(())
    }

    /// Load `path`, or `ordercheck.toml` from the working directory if it
    /// exists, or built-in defaults. Returns the file actually read.
    pub fn load(path: Option<&Path>) -> Result<(Self, Option<PathBuf>), CliError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    return Ok((Self::default(), None));
                }
                fallback
            }
        };

        let text = std::fs::read_to_string(&path).map_err(|e| {
            config_err(format!("cannot read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&text)
            .map_err(|e| config_err(format!("{}: {}", path.display(), e.message)))?;
        Ok((config, Some(path)))
    }

    /// Apply flag overrides, then re-validate the merged result.
    pub fn apply(&mut self, overrides: &Overrides) -> Result<(), CliError> {
        if let Some(t) = overrides.tolerance {
            self.reconcile.tolerance = t;
        }
        if let Some(n) = overrides.page_size {
            self.provider.page_size = n;
        }
        if let Some(n) = overrides.max_pages {
            self.provider.max_pages = n;
        }
        if let Some(n) = overrides.workers {
            self.provider.workers = n;
        }
        if let Some(p) = overrides.detail_policy {
            self.provider.detail_policy = p;
        }
        if let Some(url) = &overrides.base_url {
            self.provider.base_url = url.clone();
        }
        self.validate()
    }
}

/// API key: flag > env > error. Never read from the config file.
pub fn resolve_api_key(flag: Option<String>, env_var: &str) -> Result<String, CliError> {
    let missing = || CliError {
        code: EXIT_MISSING_CREDENTIALS,
        message: format!("missing provider API key (use --api-key or set {env_var})"),
        hint: None,
    };

    if let Some(key) = flag {
        let trimmed = key.trim().to_string();
        if trimmed.is_empty() {
            return Err(missing());
        }
        return Ok(trimmed);
    }

    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(missing()),
    }
}
