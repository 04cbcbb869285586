//! Configuration loaded from environment variables.

use harbor_engine::{Schema, SchemaVersion};
use std::env;
use std::path::PathBuf;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding the file-backed store
    pub data_dir: PathBuf,
    /// Base URL of the remote record service
    pub remote_url: Option<String>,
    /// Bearer token for the remote service
    pub auth_token: Option<String>,
    /// Local schema version
    pub schema_version: SchemaVersion,
    /// Application collections
    pub collections: Vec<String>,
    /// Per-request timeout of the remote service, in seconds
    pub remote_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = lookup("HARBOR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".harbor"));

        let remote_url = lookup("HARBOR_REMOTE_URL").filter(|s| !s.trim().is_empty());

        let auth_token = lookup("HARBOR_AUTH_TOKEN").filter(|s| !s.is_empty());

        let schema_version = lookup("HARBOR_SCHEMA_VERSION")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidSchemaVersion)?;

        let collections = lookup("HARBOR_COLLECTIONS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let remote_timeout_secs = lookup("HARBOR_REMOTE_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidTimeout)?;

        Ok(Self {
            data_dir,
            remote_url,
            auth_token,
            schema_version,
            collections,
            remote_timeout_secs,
        })
    }

    /// Schema described by this configuration.
    pub fn schema(&self) -> Schema {
        self.collections
            .iter()
            .fold(Schema::new(self.schema_version), |schema, name| {
                schema.with_collection(name.as_str())
            })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("HARBOR_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid HARBOR_SCHEMA_VERSION value")]
    InvalidSchemaVersion,

    #[error("Invalid HARBOR_REMOTE_TIMEOUT_SECS value")]
    InvalidTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.data_dir, PathBuf::from(".harbor"));
        assert_eq!(config.remote_url, None);
        assert_eq!(config.schema_version, 1);
        assert!(config.collections.is_empty());
        assert_eq!(config.remote_timeout_secs, 30);
    }

    #[test]
    fn full_configuration() {
        let config = Config::from_lookup(lookup(&[
            ("HARBOR_DATA_DIR", "/var/lib/harbor"),
            ("HARBOR_REMOTE_URL", "https://api.example.com"),
            ("HARBOR_AUTH_TOKEN", "secret"),
            ("HARBOR_SCHEMA_VERSION", "3"),
            ("HARBOR_COLLECTIONS", "customers, products,,"),
            ("HARBOR_REMOTE_TIMEOUT_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/harbor"));
        assert_eq!(config.remote_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.collections, vec!["customers", "products"]);

        let schema = config.schema();
        assert_eq!(schema.version, 3);
        assert!(schema.contains("customers"));
        assert!(schema.contains("products"));
    }

    #[test]
    fn invalid_numbers() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("HARBOR_SCHEMA_VERSION", "x")])),
            Err(ConfigError::InvalidSchemaVersion)
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HARBOR_REMOTE_TIMEOUT_SECS", "-1")])),
            Err(ConfigError::InvalidTimeout)
        ));
    }
}
