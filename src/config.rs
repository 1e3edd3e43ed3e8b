use std::path::PathBuf;
use std::time::Duration;

use crate::error::ErrorKind;

/// Application-level constants
pub const APP_NAME: &str = "Tabib";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Global notification cap, shared by every recipient.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 50;

/// PBKDF2 rounds for the mock credential registry.
pub const DEFAULT_CREDENTIAL_HASH_ITERATIONS: u32 = 10_000;

const ENV_DATA_DIR: &str = "TABIB_DATA_DIR";
const ENV_NOTIFICATION_BACKEND: &str = "TABIB_NOTIFICATION_BACKEND";
const ENV_NOTIFICATION_CAPACITY: &str = "TABIB_NOTIFICATION_CAPACITY";
const ENV_STORE_LATENCY_MS: &str = "TABIB_STORE_LATENCY_MS";

/// Get the application data directory
/// Falls back to the temp dir when the platform has no local data dir.
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// JSON file backing the notification list
pub fn notifications_file() -> PathBuf {
    app_data_dir().join("notifications.json")
}

/// SQLite database backing the notification list
pub fn notifications_db() -> PathBuf {
    app_data_dir().join("notifications.db")
}

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "tabib=info"
}

// ═══════════════════════════════════════════════════════════
// StoreConfig
// ═══════════════════════════════════════════════════════════

/// Where the notification list is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationBackend {
    /// Process memory only; lost on restart.
    Memory,
    JsonFile(PathBuf),
    Sqlite(PathBuf),
}

/// Runtime configuration for the booking core.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub notification_backend: NotificationBackend,
    /// Maximum notifications kept across all recipients.
    pub notification_capacity: usize,
    /// Artificial delay applied before each store operation.
    pub simulated_latency: Duration,
    pub credential_hash_iterations: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: app_data_dir(),
            notification_backend: NotificationBackend::JsonFile(notifications_file()),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            simulated_latency: Duration::ZERO,
            credential_hash_iterations: DEFAULT_CREDENTIAL_HASH_ITERATIONS,
        }
    }
}

impl StoreConfig {
    /// In-memory configuration with no latency and cheap hashing (tests, demos).
    pub fn ephemeral() -> Self {
        Self {
            data_dir: std::env::temp_dir().join(APP_NAME),
            notification_backend: NotificationBackend::Memory,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            simulated_latency: Duration::ZERO,
            credential_hash_iterations: 1_000,
        }
    }

    /// Build a configuration from `TABIB_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`], reading through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir.trim());
        }

        let backend = lookup(ENV_NOTIFICATION_BACKEND).unwrap_or_else(|| "json".to_string());
        config.notification_backend = match backend.trim().to_ascii_lowercase().as_str() {
            "memory" => NotificationBackend::Memory,
            "json" => NotificationBackend::JsonFile(config.data_dir.join("notifications.json")),
            "sqlite" => NotificationBackend::Sqlite(config.data_dir.join("notifications.db")),
            other => {
                return Err(ConfigError::InvalidValue {
                    key: ENV_NOTIFICATION_BACKEND,
                    value: other.to_string(),
                })
            }
        };

        if let Some(raw) = lookup(ENV_NOTIFICATION_CAPACITY) {
            let capacity: usize = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_NOTIFICATION_CAPACITY,
                value: raw.clone(),
            })?;
            if capacity == 0 {
                return Err(ConfigError::InvalidValue {
                    key: ENV_NOTIFICATION_CAPACITY,
                    value: raw,
                });
            }
            config.notification_capacity = capacity;
        }

        if let Some(raw) = lookup(ENV_STORE_LATENCY_MS) {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_STORE_LATENCY_MS,
                value: raw.clone(),
            })?;
            config.simulated_latency = Duration::from_millis(millis);
        }

        Ok(config)
    }
}

/// Errors from configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidField
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_data_dir_ends_with_app_name() {
        assert!(app_data_dir().ends_with(APP_NAME));
    }

    #[test]
    fn notification_files_under_app_data() {
        assert!(notifications_file().starts_with(app_data_dir()));
        assert!(notifications_db().starts_with(app_data_dir()));
    }

    #[test]
    fn defaults_without_env() {
        let config = StoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.notification_capacity, 50);
        assert_eq!(config.simulated_latency, Duration::ZERO);
        assert!(matches!(
            config.notification_backend,
            NotificationBackend::JsonFile(_)
        ));
    }

    #[test]
    fn env_overrides_backend_and_latency() {
        let config = StoreConfig::from_lookup(lookup_from(&[
            ("TABIB_DATA_DIR", "/srv/tabib"),
            ("TABIB_NOTIFICATION_BACKEND", "sqlite"),
            ("TABIB_STORE_LATENCY_MS", "25"),
            ("TABIB_NOTIFICATION_CAPACITY", "10"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/tabib"));
        assert_eq!(
            config.notification_backend,
            NotificationBackend::Sqlite(PathBuf::from("/srv/tabib/notifications.db"))
        );
        assert_eq!(config.simulated_latency, Duration::from_millis(25));
        assert_eq!(config.notification_capacity, 10);
    }

    #[test]
    fn unknown_backend_rejected() {
        let err = StoreConfig::from_lookup(lookup_from(&[("TABIB_NOTIFICATION_BACKEND", "redis")]))
            .unwrap_err();
        assert!(err.to_string().contains("TABIB_NOTIFICATION_BACKEND"));
        assert_eq!(err.kind(), ErrorKind::InvalidField);
    }

    #[test]
    fn zero_capacity_rejected() {
        let result =
            StoreConfig::from_lookup(lookup_from(&[("TABIB_NOTIFICATION_CAPACITY", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn ephemeral_uses_memory_backend() {
        let config = StoreConfig::ephemeral();
        assert_eq!(config.notification_backend, NotificationBackend::Memory);
    }
}
