//! Client configuration: YAML file plus `CONFAB_*` environment overrides.
//!
//! Resolution order for the file is explicit path, then `$CONFAB_CONFIG`,
//! then `./confab.yaml`; a missing default file yields the built-in
//! defaults. Environment overrides are applied last and always win.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONFIG_FILE: &str = "confab.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfabConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub transcript: TranscriptConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

/// Relay backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the relay.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Ceiling for non-streamed requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Use the SSE endpoint for sends.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Whole-request ceiling for one streamed send, in seconds.
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_stream_timeout() -> u64 {
    60
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stream_timeout_secs: default_stream_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between background history polls; 0 disables the poller.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Allow regenerating directly from a user message.
    #[serde(default = "default_true")]
    pub regenerate_from_user: bool,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            regenerate_from_user: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Expand reasoning blocks by default.
    #[serde(default)]
    pub show_thinking: bool,

    /// Upper bound on retained chat view entries.
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    3000
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_thinking: false,
            max_entries: default_max_entries(),
        }
    }
}

impl ConfabConfig {
    /// Load configuration, layering environment overrides on top of the
    /// resolved file (or the defaults when no file is found).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::resolve_path(explicit) {
            Some(path) => {
                debug!(path = %path.display(), "loading config file");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// An explicit path or `$CONFAB_CONFIG` must exist; the default file
    /// is only used when present.
    fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Ok(path) = std::env::var("CONFAB_CONFIG")
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `CONFAB_*` variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CONFAB_BACKEND_URL")
            && !url.is_empty()
        {
            self.backend.base_url = url;
        }
        if let Some(enabled) = env_bool("CONFAB_STREAMING") {
            self.streaming.enabled = enabled;
        }
        if let Some(secs) = env_u64("CONFAB_STREAM_TIMEOUT_SECS") {
            self.streaming.stream_timeout_secs = secs;
        }
        if let Some(secs) = env_u64("CONFAB_POLL_SECS") {
            self.polling.interval_secs = secs;
        }
        if let Some(show) = env_bool("CONFAB_SHOW_THINKING") {
            self.ui.show_thinking = show;
        }
    }
}

pub fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?.to_lowercase();
    match value.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.parse::<u64>().ok()
}

pub fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok()?.parse::<usize>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard, OnceLock};

    // Env-var tests share the process environment; serialize them.
    fn env_lock() -> MutexGuard<'static, ()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn with_env<T>(overrides: &[(&str, Option<&str>)], f: impl FnOnce() -> T) -> T {
        let _guard = env_lock();
        let saved: Vec<(String, Option<String>)> = overrides
            .iter()
            .map(|(key, _)| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for (key, value) in overrides {
            match value {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
        let result = f();
        for (key, value) in saved {
            match value {
                Some(value) => unsafe { std::env::set_var(&key, value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
        result
    }

    const ALL_VARS: &[(&str, Option<&str>)] = &[
        ("CONFAB_CONFIG", None),
        ("CONFAB_BACKEND_URL", None),
        ("CONFAB_STREAMING", None),
        ("CONFAB_STREAM_TIMEOUT_SECS", None),
        ("CONFAB_POLL_SECS", None),
        ("CONFAB_SHOW_THINKING", None),
    ];

    #[test]
    fn test_defaults() {
        let config = ConfabConfig::default();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.backend.request_timeout_secs, 60);
        assert!(config.streaming.enabled);
        assert_eq!(config.streaming.stream_timeout_secs, 60);
        assert_eq!(config.polling.interval_secs, 5);
        assert!(config.transcript.regenerate_from_user);
        assert!(!config.ui.show_thinking);
        assert_eq!(config.ui.max_entries, 3000);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: ConfabConfig = serde_yaml::from_str(
            "backend:\n  base_url: \"http://10.0.0.2:9000\"\nstreaming:\n  enabled: false\n",
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "http://10.0.0.2:9000");
        assert!(!config.streaming.enabled);
        assert_eq!(config.streaming.stream_timeout_secs, 60);
        assert_eq!(config.polling.interval_secs, 5);
    }

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "polling:\n  interval_secs: 30").unwrap();
        with_env(ALL_VARS, || {
            let config = ConfabConfig::load(Some(file.path())).unwrap();
            assert_eq!(config.polling.interval_secs, 30);
            assert_eq!(config.backend.base_url, "http://127.0.0.1:8080");
        });
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        with_env(ALL_VARS, || {
            let result = ConfabConfig::load(Some(Path::new("/nonexistent/confab.yaml")));
            assert!(matches!(result, Err(ConfigError::Io { .. })));
        });
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend: [not, a, map").unwrap();
        with_env(ALL_VARS, || {
            let result = ConfabConfig::load(Some(file.path()));
            assert!(matches!(result, Err(ConfigError::Parse { .. })));
        });
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend:\n  base_url: \"http://from-file:1\"").unwrap();
        with_env(
            &[
                ("CONFAB_BACKEND_URL", Some("http://from-env:2")),
                ("CONFAB_STREAMING", Some("off")),
                ("CONFAB_POLL_SECS", Some("0")),
                ("CONFAB_STREAM_TIMEOUT_SECS", None),
                ("CONFAB_SHOW_THINKING", Some("yes")),
                ("CONFAB_CONFIG", None),
            ],
            || {
                let config = ConfabConfig::load(Some(file.path())).unwrap();
                assert_eq!(config.backend.base_url, "http://from-env:2");
                assert!(!config.streaming.enabled);
                assert_eq!(config.polling.interval_secs, 0);
                assert!(config.ui.show_thinking);
            },
        );
    }

    #[test]
    fn test_env_bool_parsing() {
        with_env(&[("CONFAB_TEST_FLAG", Some("TRUE"))], || {
            assert_eq!(env_bool("CONFAB_TEST_FLAG"), Some(true));
        });
        with_env(&[("CONFAB_TEST_FLAG", Some("0"))], || {
            assert_eq!(env_bool("CONFAB_TEST_FLAG"), Some(false));
        });
        with_env(&[("CONFAB_TEST_FLAG", Some("maybe"))], || {
            assert_eq!(env_bool("CONFAB_TEST_FLAG"), None);
        });
        with_env(&[("CONFAB_TEST_FLAG", None)], || {
            assert_eq!(env_bool("CONFAB_TEST_FLAG"), None);
        });
    }
}
