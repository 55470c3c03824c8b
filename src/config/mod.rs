//! Configuration system (layered: code > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::chain::DEFAULT_PORTAL_BASE_URL;
use crate::auth::credential::{DEVICE_CODE_GRANT_TYPE, REFRESH_TOKEN_GRANT_TYPE};
use crate::auth::oidc::DEFAULT_OIDC_BASE_URL;
use crate::auth::poller::{DEFAULT_MAX_ATTEMPTS, DEFAULT_SLOW_DOWN_INCREMENT};
use crate::auth::PollPolicy;
use crate::error::{DevgrantError, Result};

pub const DEFAULT_START_URL: &str = "https://view.awsapps.com/start";
pub const DEFAULT_CLIENT_NAME: &str = "devgrant";
pub const DEFAULT_RESULTS_FILE: &str = "accounts.json";
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 5_000;

const DEFAULT_SCOPES: [&str; 5] = [
    "codewhisperer:analysis",
    "codewhisperer:completions",
    "codewhisperer:conversations",
    "codewhisperer:taskassist",
    "codewhisperer:transformations",
];

/// One SSO-OIDC realm: where to register and what to ask for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    pub oidc_base_url: String,
    pub start_url: String,
    pub client_name: String,
    pub scopes: Vec<String>,
    pub grant_types: Vec<String>,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            oidc_base_url: DEFAULT_OIDC_BASE_URL.to_string(),
            start_url: DEFAULT_START_URL.to_string(),
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            grant_types: vec![
                DEVICE_CODE_GRANT_TYPE.to_string(),
                REFRESH_TOKEN_GRANT_TYPE.to_string(),
            ],
        }
    }
}

/// Serializable form of a [`PollPolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub max_attempts: u32,
    /// Starting cadence; `None` uses the server's `interval` hint.
    pub interval_secs: Option<u64>,
    pub slow_down_increment_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval_secs: None,
            slow_down_increment_secs: DEFAULT_SLOW_DOWN_INCREMENT.as_secs(),
        }
    }
}

impl PollSettings {
    pub fn chained() -> Self {
        Self {
            max_attempts: 20,
            interval_secs: Some(1),
            slow_down_increment_secs: DEFAULT_SLOW_DOWN_INCREMENT.as_secs(),
        }
    }

    pub fn policy(&self) -> PollPolicy {
        PollPolicy::builder()
            .max_attempts(self.max_attempts)
            .maybe_base_interval(self.interval_secs.map(Duration::from_secs))
            .slow_down_increment(Duration::from_secs(self.slow_down_increment_secs))
            .build()
    }
}

/// Settings for device-grant flows.
///
/// # Example
/// ```no_run
/// use devgrant::config::DevgrantConfig;
///
/// let config = DevgrantConfig::load(None)?;
/// println!("{}", config.realm.oidc_base_url);
/// # Ok::<(), devgrant::error::DevgrantError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevgrantConfig {
    pub realm: RealmConfig,
    pub chained_realm: RealmConfig,
    pub portal_base_url: String,
    pub poll: PollSettings,
    pub chained_poll: PollSettings,
    pub http_timeout_secs: u64,
    pub chain_enabled: bool,
    pub max_workers: usize,
    /// Spacing between consecutive flow launches in a batch.
    pub batch_interval_ms: u64,
    pub results_path: PathBuf,
}

impl Default for DevgrantConfig {
    fn default() -> Self {
        Self {
            realm: RealmConfig::default(),
            chained_realm: RealmConfig::default(),
            portal_base_url: DEFAULT_PORTAL_BASE_URL.to_string(),
            poll: PollSettings::default(),
            chained_poll: PollSettings::chained(),
            http_timeout_secs: 30,
            chain_enabled: true,
            max_workers: 2,
            batch_interval_ms: DEFAULT_BATCH_INTERVAL_MS,
            results_path: PathBuf::from(DEFAULT_RESULTS_FILE),
        }
    }
}

impl DevgrantConfig {
    /// Default config file path (`~/.devgrant/config.toml`).
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".devgrant"))
            .unwrap_or_else(|| PathBuf::from(".devgrant"))
            .join("config.toml")
    }

    /// Read a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with `DEVGRANT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load `path` (or the default file when it exists), then apply env.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DEVGRANT_OIDC_BASE_URL") {
            self.realm.oidc_base_url = url.clone();
            self.chained_realm.oidc_base_url = url;
        }
        if let Some(url) = lookup("DEVGRANT_START_URL") {
            self.realm.start_url = url.clone();
            self.chained_realm.start_url = url;
        }
        if let Some(url) = lookup("DEVGRANT_PORTAL_BASE_URL") {
            self.portal_base_url = url;
        }
        if let Some(name) = lookup("DEVGRANT_CLIENT_NAME") {
            self.realm.client_name = name.clone();
            self.chained_realm.client_name = name;
        }
        if let Some(value) = lookup("DEVGRANT_MAX_ATTEMPTS") {
            self.poll.max_attempts = parse_var("DEVGRANT_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("DEVGRANT_POLL_INTERVAL_SECS") {
            self.poll.interval_secs = Some(parse_var("DEVGRANT_POLL_INTERVAL_SECS", &value)?);
        }
        if let Some(value) = lookup("DEVGRANT_SLOW_DOWN_INCREMENT_SECS") {
            let secs = parse_var("DEVGRANT_SLOW_DOWN_INCREMENT_SECS", &value)?;
            self.poll.slow_down_increment_secs = secs;
            self.chained_poll.slow_down_increment_secs = secs;
        }
        if let Some(value) = lookup("DEVGRANT_HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = parse_var("DEVGRANT_HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("DEVGRANT_MAX_WORKERS") {
            self.max_workers = parse_var("DEVGRANT_MAX_WORKERS", &value)?;
        }
        if let Some(value) = lookup("DEVGRANT_BATCH_INTERVAL_MS") {
            self.batch_interval_ms = parse_var("DEVGRANT_BATCH_INTERVAL_MS", &value)?;
        }
        if let Some(path) = lookup("DEVGRANT_RESULTS_PATH") {
            self.results_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("DEVGRANT_CHAIN") {
            self.chain_enabled = parse_bool("DEVGRANT_CHAIN", &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        for (label, realm) in [("realm", &self.realm), ("chained_realm", &self.chained_realm)] {
            if realm.scopes.is_empty() {
                return Err(DevgrantError::Configuration(format!(
                    "{label}.scopes must not be empty"
                )));
            }
            if !realm.grant_types.iter().any(|g| g == DEVICE_CODE_GRANT_TYPE) {
                return Err(DevgrantError::Configuration(format!(
                    "{label}.grant_types must include {DEVICE_CODE_GRANT_TYPE}"
                )));
            }
        }
        if self.poll.max_attempts == 0 || self.chained_poll.max_attempts == 0 {
            return Err(DevgrantError::Configuration(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(DevgrantError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(DevgrantError::Configuration(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        DevgrantError::Configuration(format!("{key} has invalid value {value:?}"))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DevgrantError::Configuration(format!(
            "{key} has invalid value {value:?}"
        ))),
    }
}
