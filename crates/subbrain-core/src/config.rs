use crate::version::LATEST_ENGINE_VERSION;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `panel_url`.
pub const PANEL_URL_ENV: &str = "SUBBRAIN_PANEL_URL";

/// Get the config directory path
pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("subbrain")
}

/// Get the config file path
pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}

/// Get the persisted session file path
pub fn get_session_path() -> PathBuf {
    get_config_dir().join("session.json")
}

/// Addresses a Subgen container is usually reachable on from inside docker.
pub fn default_candidates() -> Vec<String> {
    [
        "http://subgen:9000",
        "http://host.docker.internal:9000",
        "http://host.docker.internal:9007",
        "http://host.docker.internal:9919",
        "http://172.17.0.1:9000",
        "http://172.17.0.1:9007",
        "http://172.17.0.1:9919",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_panel_url() -> String {
    "http://localhost:9001".to_string()
}

fn default_latest_engine_version() -> String {
    LATEST_ENGINE_VERSION.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_version_timeout_secs() -> u64 {
    3
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_health_interval_secs() -> u64 {
    30
}

fn default_log_interval_secs() -> u64 {
    5
}

fn default_log_lines() -> u32 {
    200
}

/// Control panel client configuration (persisted as config.json)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    /// Base URL of the control-panel service
    #[serde(default = "default_panel_url")]
    pub panel_url: String,
    /// Newest engine release; anything older is reported as outdated
    #[serde(default = "default_latest_engine_version")]
    pub latest_engine_version: String,
    /// Upper bound for one reachability check (default: 10)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Upper bound for the follow-up version lookup (default: 3)
    #[serde(default = "default_version_timeout_secs")]
    pub version_timeout_secs: u64,
    /// Upper bound for any other panel request (default: 10)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,
    #[serde(default = "default_log_interval_secs")]
    pub log_interval_secs: u64,
    /// Number of most recent log lines fetched per poll
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,
    /// Addresses probed by a direct scan, in display order
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            panel_url: default_panel_url(),
            latest_engine_version: default_latest_engine_version(),
            probe_timeout_secs: default_probe_timeout_secs(),
            version_timeout_secs: default_version_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            health_interval_secs: default_health_interval_secs(),
            log_interval_secs: default_log_interval_secs(),
            log_lines: default_log_lines(),
            candidates: default_candidates(),
        }
    }
}

impl PanelConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn version_timeout(&self) -> Duration {
        Duration::from_secs(self.version_timeout_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }

    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_secs.max(1))
    }

    /// Apply `SUBBRAIN_PANEL_URL` if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(PANEL_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.panel_url = url.trim_end_matches('/').to_string();
            }
        }
        self
    }
}

/// Load config from `path`. A missing file yields defaults; a malformed one
/// is logged and replaced by defaults.
pub fn load_config_from(path: &Path) -> PanelConfig {
    if !path.exists() {
        return PanelConfig::default();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                PanelConfig::default()
            }
        },
        Err(e) => {
            log::warn!("Failed to read {}: {}, using defaults", path.display(), e);
            PanelConfig::default()
        }
    }
}

/// Load config from the default location, then apply environment overrides.
pub fn load_config() -> PanelConfig {
    load_config_from(&get_config_path()).with_env_overrides()
}

/// Save config to `path`
pub fn save_config_to(path: &Path, config: &PanelConfig) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("nope.json"));
        assert_eq!(config, PanelConfig::default());
        assert_eq!(config.candidates.len(), 7);
        assert_eq!(config.candidates[0], "http://subgen:9000");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"panel_url":"http://nas:9001","log_lines":50}"#).unwrap();
        let config = load_config_from(&path);
        assert_eq!(config.panel_url, "http://nas:9001");
        assert_eq!(config.log_lines, 50);
        assert_eq!(config.health_interval_secs, 30);
        assert_eq!(config.latest_engine_version, LATEST_ENGINE_VERSION);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_config_from(&path), PanelConfig::default());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = PanelConfig {
            log_interval_secs: 2,
            candidates: vec!["http://10.0.0.5:9000".into()],
            ..PanelConfig::default()
        };
        save_config_to(&path, &config).unwrap();
        assert_eq!(load_config_from(&path), config);
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let config = PanelConfig {
            log_interval_secs: 0,
            ..PanelConfig::default()
        };
        assert_eq!(config.log_interval(), Duration::from_secs(1));
    }
}
