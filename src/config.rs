//! Agent configuration.
//!
//! Loaded from a TOML file at startup and validated before anything else
//! runs; an invalid configuration is a startup failure.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Default poll period for the routing API, seconds.
const DEFAULT_POLL_PERIOD_SECS: u64 = 10;

/// Default schedule refresh period, seconds.
const DEFAULT_SCHEDULE_PERIOD_SECS: u64 = 300;

/// Default edge fan-out per routing query.
const DEFAULT_EDGE_LIMIT: u32 = 2000;

fn default_poll_period() -> u64 {
    DEFAULT_POLL_PERIOD_SECS
}

fn default_schedule_period() -> u64 {
    DEFAULT_SCHEDULE_PERIOD_SECS
}

fn default_edge_limit() -> u32 {
    DEFAULT_EDGE_LIMIT
}

fn default_snapshot_path() -> String {
    crate::store::DEFAULT_SNAPSHOT_PATH.to_string()
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Config file did not parse as TOML
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    /// Parsed fine but violates a constraint
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Routing API poll period, seconds.
    #[serde(default = "default_poll_period")]
    pub period_secs: u64,

    /// Tags to monitor; at least one is required.
    pub tags: Vec<String>,

    /// Label of the TDA fallback source.
    #[serde(default)]
    pub tda: String,

    /// Label of the Zorro fallback source.
    #[serde(default)]
    pub zorro: String,

    /// Bus-state snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// Nameset-based label mapping; correlation is disabled without it.
    pub mapping: Option<MappingConfig>,

    pub api: ApiConfig,

    pub elasticsearch: ElasticsearchConfig,

    pub notifiers: Option<NotifiersConfig>,
}

/// How destination and source labels are resolved from namesets.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingConfig {
    /// Nameset holding the operator-facing labels.
    pub nameset: String,

    /// Label used when a terminal has no value in that nameset.
    #[serde(default)]
    pub default: String,
}

/// Routing GraphQL API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub url: String,

    #[serde(default = "default_edge_limit")]
    pub limit: u32,

    /// Enable the push-subscription path.
    #[serde(default)]
    pub notifications: bool,

    pub auth: OidcConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    pub client_id: String,
    pub client_secret: String,
    pub token_url: String,
}

/// Scheduler analytics backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticsearchConfig {
    pub address: String,
    pub index: String,

    /// Schedule refresh period, seconds.
    #[serde(default = "default_schedule_period")]
    pub period_secs: u64,
}

/// Notifier delivery settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifiersConfig {
    /// Detector host reported in notifications; defaults to $HOSTNAME.
    pub origin: Option<String>,

    /// Statically declared notifier endpoints.
    #[serde(default)]
    pub manual: Vec<ManualNodeConfig>,

    /// Locator-based discovery; used when `manual` is empty.
    pub auto: Option<AutoNotifierConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualNodeConfig {
    pub node: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutoNotifierConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub types: Vec<String>,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        config.validate()?;

        Ok(config)
    }

    /// Parse from a TOML string (tests, embedded defaults).
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tags.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one tag is required".to_string(),
            ));
        }

        if let Some(mapping) = &self.mapping {
            if mapping.nameset.is_empty() {
                return Err(ConfigError::Invalid(
                    "mapping.nameset cannot be blank when mapping is enabled".to_string(),
                ));
            }
        }

        if self.api.url.is_empty() {
            return Err(ConfigError::Invalid("api.url is required".to_string()));
        }

        let auth = &self.api.auth;
        if auth.client_id.is_empty() || auth.client_secret.is_empty() || auth.token_url.is_empty() {
            return Err(ConfigError::Invalid(
                "api.auth requires client_id, client_secret and token_url".to_string(),
            ));
        }

        if self.elasticsearch.address.is_empty() || self.elasticsearch.index.is_empty() {
            return Err(ConfigError::Invalid(
                "elasticsearch requires address and index".to_string(),
            ));
        }

        Ok(())
    }

    /// Routing API poll period.
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.period_secs)
    }

    /// Schedule refresh period.
    pub fn schedule_period(&self) -> Duration {
        Duration::from_secs(self.elasticsearch.period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        period_secs = 15
        tags = ["MES", "IPAN"]
        tda = "TDA1"
        zorro = "ZZ"

        [mapping]
        nameset = "BUSCODES"
        default = "UNKNOWN"

        [api]
        url = "https://router.example/graphql/v1.1"
        limit = 500
        notifications = true

        [api.auth]
        client_id = "agent"
        client_secret = "secret"
        token_url = "https://router.example/auth/token"

        [elasticsearch]
        address = "https://search.example:9200"
        index = "log-scheduler-*"
        period_secs = 120

        [notifiers]
        origin = "agent-host"

        [[notifiers.manual]]
        node = "10.0.0.5"
        port = 20060
    "#;

    const MINIMAL: &str = r#"
        tags = ["MES"]

        [api]
        url = "https://router.example/graphql/v1.1"
        [api.auth]
        client_id = "agent"
        client_secret = "secret"
        token_url = "https://router.example/auth/token"

        [elasticsearch]
        address = "https://search.example:9200"
        index = "log-scheduler-*"
    "#;

    #[test]
    fn parse_full_config() {
        let config = Config::from_toml(FULL).unwrap();

        assert_eq!(config.period_secs, 15);
        assert_eq!(config.tags, vec!["MES", "IPAN"]);
        assert_eq!(config.tda, "TDA1");
        assert_eq!(config.zorro, "ZZ");
        assert_eq!(config.mapping.as_ref().unwrap().nameset, "BUSCODES");
        assert_eq!(config.api.limit, 500);
        assert!(config.api.notifications);
        assert_eq!(config.elasticsearch.period_secs, 120);

        let notifiers = config.notifiers.unwrap();
        assert_eq!(notifiers.origin.as_deref(), Some("agent-host"));
        assert_eq!(notifiers.manual.len(), 1);
        assert_eq!(notifiers.manual[0].port, 20060);
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let config = Config::from_toml(MINIMAL).unwrap();

        assert_eq!(config.period_secs, DEFAULT_POLL_PERIOD_SECS);
        assert_eq!(config.api.limit, DEFAULT_EDGE_LIMIT);
        assert!(!config.api.notifications);
        assert_eq!(
            config.elasticsearch.period_secs,
            DEFAULT_SCHEDULE_PERIOD_SECS
        );
        assert_eq!(config.snapshot_path, "bus_cache.bin");
        assert!(config.mapping.is_none());
        assert!(config.notifiers.is_none());
        assert_eq!(config.poll_period(), Duration::from_secs(10));
        assert_eq!(config.schedule_period(), Duration::from_secs(300));
    }

    #[test]
    fn rejects_empty_tags() {
        let toml = MINIMAL.replace(r#"tags = ["MES"]"#, "tags = []");
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("at least one tag"));
    }

    #[test]
    fn rejects_blank_mapping_nameset() {
        let toml = format!("{MINIMAL}\n[mapping]\nnameset = \"\"\n");
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("mapping.nameset"));
    }

    #[test]
    fn rejects_missing_auth_fields() {
        let toml = MINIMAL.replace(r#"client_secret = "secret""#, r#"client_secret = """#);
        let err = Config::from_toml(&toml).unwrap_err();
        assert!(err.to_string().contains("api.auth"));
    }
}
