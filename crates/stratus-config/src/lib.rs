pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable that points at a settings file directly
pub const CONFIG_PATH_ENV: &str = "STRATUS_CONFIG_PATH";

const CANDIDATES: [&str; 3] = ["stratus.local.yaml", "stratus.yaml", ".stratus.yaml"];

/// Provider-wide settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSettings {
    /// AWS region; falls back to the SDK's region resolution
    pub region: Option<String>,

    /// Named profile from the shared AWS config files
    pub profile: Option<String>,

    /// Maximum SDK attempts per API call
    pub max_retries: Option<u32>,

    /// Tags added to every taggable resource
    pub default_tags: BTreeMap<String, String>,

    pub ignore_tags: IgnoreTags,
}

/// Tag keys the provider never manages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreTags {
    pub keys: Vec<String>,
    pub key_prefixes: Vec<String>,
}

/// Finds the settings file
///
/// Search order:
/// 1. `STRATUS_CONFIG_PATH` (direct path)
/// 2. current directory: stratus.local.yaml, stratus.yaml, .stratus.yaml
/// 3. `./.stratus/` directory, same order
/// 4. `<config dir>/stratus/config.yaml` (global settings)
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
    }

    let current_dir = std::env::current_dir()?;
    for dir in [current_dir.clone(), current_dir.join(".stratus")] {
        if !dir.is_dir() {
            continue;
        }
        for filename in &CANDIDATES {
            let path = dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("stratus").join("config.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Loads settings from a specific file.
pub fn load_from(path: &Path) -> Result<ProviderSettings> {
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(ProviderSettings::default());
    }
    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads settings from the discovered file, or defaults when there is none.
pub fn load() -> Result<ProviderSettings> {
    match find_config_file() {
        Ok(path) => {
            tracing::debug!(path = %path.display(), "loading provider settings");
            load_from(&path)
        }
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("no settings file found, using defaults");
            Ok(ProviderSettings::default())
        }
        Err(e) => Err(e),
    }
}
