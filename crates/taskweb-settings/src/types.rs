//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file may specify any subset of fields.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// ```json
/// {
///   "database": { "path": "/var/lib/taskweb/tasks.db", "poolSize": 4 },
///   "dependencies": { "rejectCycles": true },
///   "logging": { "level": "info" }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskwebSettings {
    /// `SQLite` storage settings.
    pub database: DatabaseSettings,
    /// Dependency graph rules.
    pub dependencies: DependencySettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl TaskwebSettings {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.database.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "database.poolSize must be at least 1".to_string(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(SettingsError::InvalidValue(
                "database.path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// `SQLite` storage settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Database file location.
    pub path: PathBuf,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
    /// How long a writer waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u32,
    /// Page cache size in KiB.
    pub cache_size_kib: i64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: crate::loader::settings_dir().join("taskweb.db"),
            pool_size: 16,
            busy_timeout_ms: 30_000,
            cache_size_kib: 8192,
        }
    }
}

/// Dependency graph rules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DependencySettings {
    /// Refuse edges that would close a dependency cycle.
    pub reject_cycles: bool,
}

/// Log output settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`RUST_LOG` takes precedence when set).
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(TaskwebSettings::default()).unwrap();
        assert!(json["database"].get("poolSize").is_some());
        assert!(json["database"].get("busyTimeoutMs").is_some());
        assert_eq!(json["dependencies"]["rejectCycles"], false);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: TaskwebSettings =
            serde_json::from_str(r#"{"dependencies": {"rejectCycles": true}}"#).unwrap();
        assert!(settings.dependencies.reject_cycles);
        assert_eq!(settings.database.pool_size, 16);
        assert_eq!(settings.logging.level, "warn");
    }

    #[test]
    fn validate_rejects_zero_pool() {
        let mut settings = TaskwebSettings::default();
        settings.database.pool_size = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("poolSize"));
    }

    #[test]
    fn validate_rejects_empty_path() {
        let mut settings = TaskwebSettings::default();
        settings.database.path = PathBuf::new();
        assert!(settings.validate().is_err());
    }
}
