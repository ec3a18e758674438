//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: MONGO_RICE_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/mongo-rice/{service_name}/config.toml
//! 4. System directory: /etc/mongo-rice/{service_name}/config.toml
//! 5. Default values
//!
//! ```toml
//! [mongo]
//! connection_string = "mongodb://localhost:27017"
//! database = "music"
//!
//! [logging]
//! level = "info,mongo_rice=debug"
//! json = true
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::repository::{RepositoryError, RepositoryResult};

const ENV_PREFIX: &str = "MONGO_RICE_";
const XDG_PREFIX: &str = "mongo-rice";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Document store connection
    #[serde(default)]
    pub mongo: MongoConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where repositories connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MongoConfig {
    /// MongoDB connection string, e.g. `mongodb://localhost:27017`
    #[serde(default)]
    pub connection_string: String,

    /// Database holding the collections
    #[serde(default)]
    pub database: String,
}

impl MongoConfig {
    /// Create a configuration
    pub fn new(connection_string: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database: database.into(),
        }
    }

    /// Reject empty or blank values
    ///
    /// # Errors
    ///
    /// A `Configuration` error naming the first missing value.
    pub fn validate(&self) -> RepositoryResult<()> {
        if self.connection_string.trim().is_empty() {
            return Err(RepositoryError::configuration(
                "mongo.connection_string must not be empty",
            ));
        }
        if self.database.trim().is_empty() {
            return Err(RepositoryError::configuration(
                "mongo.database must not be empty",
            ));
        }
        Ok(())
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            database: String::new(),
        }
    }
}

fn default_connection_string() -> String {
    "mongodb://localhost:27017".to_string()
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives (trace, debug, info, warn, error, or `EnvFilter` syntax)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is taken from the running binary's file name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| XDG_PREFIX.to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later merges override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment.merge(Self::env()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Possible config file paths, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let config_file_path = Path::new(service_name).join("config.toml");
        if let Ok(path) = xdg_dirs.place_config_file(&config_file_path) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(XDG_PREFIX)
                .join(service_name)
                .join("config.toml"),
        );

        paths
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::repository::RepositoryErrorKind;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.mongo.connection_string, "mongodb://localhost:27017");
        assert!(config.mongo.database.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(MongoConfig::new("mongodb://db:27017", "music").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_and_blank_values() {
        let cases = [
            MongoConfig::new("", "music"),
            MongoConfig::new("   ", "music"),
            MongoConfig::new("mongodb://db:27017", ""),
            MongoConfig::new("mongodb://db:27017", "\t"),
        ];
        for config in cases {
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind, RepositoryErrorKind::Configuration);
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[mongo]
connection_string = "mongodb://replica:27017/?replicaSet=rs0"
database = "catalog"

[logging]
level = "debug"
json = true
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(
            config.mongo.connection_string,
            "mongodb://replica:27017/?replicaSet=rs0"
        );
        assert_eq!(config.mongo.database, "catalog");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_load_from_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mongo]\ndatabase = \"catalog\"").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.mongo.connection_string, "mongodb://localhost:27017");
        assert_eq!(config.mongo.database, "catalog");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[mongo\ndatabase = ").unwrap();

        assert!(matches!(
            Config::load_from(file.path()),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_config_paths_order() {
        let paths = Config::find_config_paths("jukebox");
        assert_eq!(paths.first(), Some(&PathBuf::from("config.toml")));
        assert_eq!(
            paths.last(),
            Some(&PathBuf::from("/etc/mongo-rice/jukebox/config.toml"))
        );
    }
}
