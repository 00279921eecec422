use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sqlagent_gateway::GatewayConfig;

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Overrides `api_base_url` from the config file.
pub const API_URL_ENV: &str = "SQLAGENT_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    pub api_base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<u32>,
    #[serde(default)]
    pub log_json: bool,
    pub created_at: jiff::Timestamp,
}

fn default_poll_interval() -> u64 {
    15
}

fn default_timeout() -> u64 {
    30
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            api_base_url: DEFAULT_API_URL.to_string(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_timeout(),
            history_limit: None,
            log_json: false,
            created_at: jiff::Timestamp::now(),
        }
    }
}

impl ExplorerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
            history_limit: self.history_limit,
        }
    }

    /// Apply `SQLAGENT_API_URL` if set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        match std::env::var(API_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => {
                tracing::debug!(url = %url, "api url overridden from environment");
                self.api_base_url = url;
            }
            _ => {}
        }
        self
    }
}

fn config_dir() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join("sqlagent-explorer"))
}

pub fn config_path() -> eyre::Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Load the config from the default location, falling back to defaults
/// when no file exists yet. Environment overrides are applied last.
pub fn load_config() -> eyre::Result<ExplorerConfig> {
    let path = config_path()?;
    let config = if path.exists() {
        load_from(&path)?
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        ExplorerConfig::default()
    };
    Ok(config.with_env_overrides())
}

pub fn load_from(path: &Path) -> eyre::Result<ExplorerConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: ExplorerConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
///
/// Each migration is a pure transform on the raw JSON value.
fn migrate(mut json: serde_json::Value, from_version: u32) -> eyre::Result<serde_json::Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update sqlagent."
        ));
    }

    // v0 → v1: `api_url` became `api_base_url`; polling became configurable.
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;
        if let Some(url) = obj.remove("api_url") {
            obj.entry("api_base_url").or_insert(url);
        }
        obj.entry("api_base_url")
            .or_insert(serde_json::Value::String(DEFAULT_API_URL.to_string()));
        obj.entry("poll_interval_secs")
            .or_insert(serde_json::Value::Number(default_poll_interval().into()));
        obj.entry("created_at")
            .or_insert(serde_json::Value::String(jiff::Timestamp::now().to_string()));
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (renamed api_url)");
    }

    Ok(json)
}

pub fn save_config(config: &ExplorerConfig) -> eyre::Result<PathBuf> {
    let path = config_path()?;
    save_to(&path, config)?;
    Ok(path)
}

pub fn save_to(path: &Path, config: &ExplorerConfig) -> eyre::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path {} has no parent", path.display()))?;
    std::fs::create_dir_all(dir)?;

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    // Write to a temp file then rename for atomicity
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
