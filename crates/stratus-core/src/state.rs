//! Local state for the developer CLI
//!
//! `.stratus/state.json` maps resource addresses (`type.name`) to the
//! attributes the provider last returned. Saves go through a temporary file
//! and keep the previous version as `state.json.backup`; `lock.json` guards
//! against two commands writing at once.

use crate::error::{ProviderError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const STATE_VERSION: u32 = 1;
const STATE_DIR: &str = ".stratus";
const STATE_FILE: &str = "state.json";
const STATE_TEMP: &str = "state.json.tmp";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Locks older than this are assumed abandoned by a crashed command.
const STALE_LOCK_HOURS: i64 = 1;

/// Every resource the CLI manages in one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    pub version: u32,

    pub updated_at: DateTime<Utc>,

    /// Keyed by `type.name` address
    pub resources: BTreeMap<String, ResourceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            resources: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_resource(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Records the attributes returned for `address`. An existing entry
    /// keeps its creation time.
    pub fn upsert_resource(&mut self, address: &str, resource_type: &str, attributes: Value) {
        match self.resources.entry(address.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().set_attributes(attributes),
            Entry::Vacant(entry) => {
                entry.insert(ResourceState::new(resource_type, attributes));
            }
        }
        self.updated_at = Utc::now();
    }

    /// Records what a failed create or update left behind.
    pub fn taint_resource(&mut self, address: &str, resource_type: &str, attributes: Value) {
        self.upsert_resource(address, resource_type, attributes);
        if let Some(resource) = self.resources.get_mut(address) {
            resource.tainted = true;
        }
    }

    pub fn remove_resource(&mut self, address: &str) -> Option<ResourceState> {
        let removed = self.resources.remove(address)?;
        self.updated_at = Utc::now();
        Some(removed)
    }
}

/// One managed resource instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Copy of `attributes.id`
    pub id: String,

    pub resource_type: String,

    pub attributes: Value,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set when a create or update failed part way; the next apply replaces it.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tainted: bool,
}

impl ResourceState {
    pub fn new(resource_type: impl Into<String>, attributes: Value) -> Self {
        let now = Utc::now();
        Self {
            id: id_of(&attributes),
            resource_type: resource_type.into(),
            attributes,
            created_at: now,
            updated_at: now,
            tainted: false,
        }
    }

    pub fn set_attributes(&mut self, attributes: Value) {
        self.id = id_of(&attributes);
        self.attributes = attributes;
        self.updated_at = Utc::now();
        self.tainted = false;
    }
}

fn id_of(attributes: &Value) -> String {
    attributes
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Splits a `type.name` address.
pub fn parse_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok((resource_type, name))
        }
        _ => Err(ProviderError::InvalidConfig(format!(
            "invalid resource address {address:?}, expected TYPE.NAME"
        ))),
    }
}

/// Reads and writes the state directory of one project
pub struct StateManager {
    dir: PathBuf,
}

impl StateManager {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            dir: project_root.as_ref().join(STATE_DIR),
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Loads the state; a project without a state file has an empty one.
    pub async fn load(&self) -> Result<GlobalState> {
        let content = match fs::read_to_string(self.path(STATE_FILE)).await {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(dir = %self.dir.display(), "no state file yet");
                return Ok(GlobalState::new());
            }
            Err(err) => return Err(err.into()),
        };

        let state: GlobalState = serde_json::from_str(&content)?;
        if state.version > STATE_VERSION {
            return Err(ProviderError::StateError(format!(
                "state file version {} is newer than supported version {STATE_VERSION}",
                state.version
            )));
        }
        tracing::debug!(resources = state.resources.len(), "loaded state");
        Ok(state)
    }

    /// Writes the state, keeping the previous file as a backup.
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let temp = self.path(STATE_TEMP);
        fs::write(&temp, serde_json::to_vec_pretty(state)?).await?;

        let current = self.path(STATE_FILE);
        if fs::try_exists(&current).await? {
            fs::copy(&current, self.path(STATE_BACKUP)).await?;
        }
        fs::rename(&temp, &current).await?;

        tracing::debug!(resources = state.resources.len(), "saved state");
        Ok(())
    }

    /// Takes the project lock. A lock held for longer than an hour is
    /// treated as abandoned and taken over.
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        fs::create_dir_all(&self.dir).await?;
        let lock_path = self.path(LOCK_FILE);

        let info = LockInfo {
            holder: hostname(),
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        let content = serde_json::to_vec_pretty(&info)?;

        for attempt in 0..2 {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(&content).await?;
                    file.flush().await?;
                    tracing::debug!(pid = info.pid, "acquired state lock");
                    return Ok(StateLock {
                        lock_path,
                        released: false,
                    });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists && attempt == 0 => {
                    let held: LockInfo =
                        serde_json::from_str(&fs::read_to_string(&lock_path).await?)?;
                    if Utc::now() - held.acquired_at < chrono::Duration::hours(STALE_LOCK_HOURS) {
                        return Err(ProviderError::LockError(format!(
                            "state is locked by {} (pid {}) since {}",
                            held.holder, held.pid, held.acquired_at
                        )));
                    }
                    tracing::warn!(holder = %held.holder, "taking over stale state lock");
                    fs::remove_file(&lock_path).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ProviderError::LockError(format!(
            "could not create {}",
            lock_path.display()
        )))
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    #[serde(default)]
    pid: u32,
    acquired_at: DateTime<Utc>,
}

/// Held project lock; dropping it releases the lock too.
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => {
                tracing::debug!("released state lock");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
