use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{DevgrantError, Result};

use super::chain::ChainedTokens;
use super::credential::ClientCredential;
use super::token::TokenPair;

pub const DEFAULT_PROVIDER: &str = "BuilderId";

/// Persisted result of one successful account flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chained_client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl AccountRecord {
    pub fn new(
        run_id: Uuid,
        credential: &ClientCredential,
        tokens: &TokenPair,
        chained: Option<&ChainedTokens>,
    ) -> Self {
        Self {
            run_id: Some(run_id),
            refresh_token: tokens.refresh_token.clone(),
            client_id: credential.client_id.clone(),
            client_secret: credential.client_secret.clone(),
            provider: DEFAULT_PROVIDER.to_string(),
            chained_refresh_token: chained.map(|c| c.tokens.refresh_token.clone()),
            chained_client_id: chained.map(|c| c.credential.client_id.clone()),
            chained_client_secret: chained.map(|c| c.credential.client_secret.clone()),
            registered_at: Some(Utc::now()),
        }
    }
}

/// Sink for finished account flows.
pub trait AccountStore: Send + Sync {
    fn append(&self, record: &AccountRecord) -> Result<()>;
    fn load_all(&self) -> Result<Vec<AccountRecord>>;
}

/// JSON-array file of account records.
///
/// Appends from concurrent flows are serialized through an internal lock and
/// each write replaces the file atomically.
///
/// # Example
/// ```no_run
/// use devgrant::auth::{AccountStore, JsonAccountStore};
///
/// let store = JsonAccountStore::new("accounts.json");
/// let records = store.load_all()?;
/// # Ok::<(), devgrant::error::DevgrantError>(())
/// ```
#[derive(Debug)]
pub struct JsonAccountStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonAccountStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_records(&self) -> Result<Vec<AccountRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(DevgrantError::Io(err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }
}

impl AccountStore for JsonAccountStore {
    fn append(&self, record: &AccountRecord) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut records = match self.read_records() {
            Ok(records) => records,
            Err(DevgrantError::Serialization(err)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Results file unreadable, starting a new list"
                );
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        records.push(record.clone());
        let serialized = serde_json::to_vec_pretty(&records)?;
        write_replacing(&self.path, &serialized)
    }

    fn load_all(&self) -> Result<Vec<AccountRecord>> {
        let _guard = self
            .lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.read_records()
    }
}

/// Replace `path` with `data` via a sibling temp file and a rename.
/// Callers hold the store lock.
fn write_replacing(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut temp_name = path
        .file_name()
        .ok_or_else(|| {
            DevgrantError::Configuration(format!(
                "results path {} is not a file",
                path.display()
            ))
        })?
        .to_os_string();
    temp_name.push(format!(".{}.tmp", std::process::id()));
    let temp_path = path.with_file_name(temp_name);

    let written = write_private(&temp_path, data).and_then(|_| fs::rename(&temp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    written.map_err(DevgrantError::Io)
}

fn write_private(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    let mut file = options.open(path)?;
    #[cfg(unix)]
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(data)?;
    file.sync_all()
}
