//! Runtime knobs read once at startup.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "config/app.json";
const CONFIG_PATH_ENV: &str = "TRAIL_QUEST_CONFIG_PATH";

const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Value expected in the `x-admin-token` header. Admin routes are closed when unset.
    pub admin_token: Option<String>,
    /// Events buffered per SSE subscriber before new ones are dropped.
    pub subscriber_buffer: usize,
    /// Interval between SSE keep-alive comments.
    pub keep_alive: Duration,
    /// Seed the demo game when running on the in-memory backend.
    pub seed_demo: bool,
}

impl AppConfig {
    /// Read the JSON file at `TRAIL_QUEST_CONFIG_PATH` (or `config/app.json`).
    /// Any failure is logged and the built-in defaults are used instead.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Self::default();
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable config file, using defaults");
                return Self::default();
            }
        };

        Self::parse(&contents)
            .inspect(|config| {
                info!(
                    path = %path.display(),
                    admin_enabled = config.admin_token.is_some(),
                    seed_demo = config.seed_demo,
                    "configuration loaded"
                );
            })
            .unwrap_or_else(|err| {
                warn!(path = %path.display(), error = %err, "malformed config file, using defaults");
                Self::default()
            })
    }

    fn parse(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

/// On-disk shape; every field is optional.
#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawConfig {
    admin_token: Option<String>,
    subscriber_buffer: usize,
    keep_alive_seconds: u64,
    seed_demo: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            keep_alive_seconds: DEFAULT_KEEP_ALIVE_SECS,
            seed_demo: true,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        Self {
            admin_token: value.admin_token.filter(|token| !token.trim().is_empty()),
            subscriber_buffer: value.subscriber_buffer.max(1),
            keep_alive: Duration::from_secs(value.keep_alive_seconds.max(1)),
            seed_demo: value.seed_demo,
        }
    }
}

fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = AppConfig::parse(r#"{"adminToken": "s3cret"}"#).unwrap();
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.subscriber_buffer, DEFAULT_SUBSCRIBER_BUFFER);
        assert_eq!(config.keep_alive, Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS));
        assert!(config.seed_demo);
    }

    #[test]
    fn blank_admin_token_disables_admin_routes() {
        let config = AppConfig::parse(r#"{"adminToken": "  ", "keepAliveSeconds": 0}"#).unwrap();
        assert_eq!(config.admin_token, None);
        assert_eq!(config.keep_alive, Duration::from_secs(1));
    }
}
