use facegate_core::{DEFAULT_EMBEDDING_DIM, DEFAULT_MATCH_THRESHOLD};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Daemon configuration.
///
/// Layered: built-in defaults, then an optional TOML file named by
/// `FACEGATE_CONFIG`, then `FACEGATE_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address the HTTP server binds to (default: 127.0.0.1:4000).
    pub listen: SocketAddr,
    /// Path to the SQLite enrollment database.
    pub db_path: PathBuf,
    /// Maximum Euclidean distance for a positive match (inclusive).
    pub match_threshold: f32,
    /// Descriptor length every embedding must have.
    pub embedding_dim: usize,
    /// Requests that may wait for the engine thread before callers block.
    pub queue_depth: usize,
    /// Browser origins allowed to call the API cross-origin.
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 4000)),
            db_path: default_data_dir().join("identities.db"),
            match_threshold: DEFAULT_MATCH_THRESHOLD,
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            queue_depth: 16,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the optional file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("FACEGATE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let src = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&src)
    }

    pub fn from_toml_str(src: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(src)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(v) = env_parse("FACEGATE_LISTEN")? {
            self.listen = v;
        }
        if let Ok(v) = std::env::var("FACEGATE_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = env_parse("FACEGATE_MATCH_THRESHOLD")? {
            self.match_threshold = v;
        }
        if let Some(v) = env_parse("FACEGATE_EMBEDDING_DIM")? {
            self.embedding_dim = v;
        }
        if let Some(v) = env_parse("FACEGATE_QUEUE_DEPTH")? {
            self.queue_depth = v;
        }
        if let Ok(v) = std::env::var("FACEGATE_ALLOWED_ORIGINS") {
            self.allowed_origins = split_list(&v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.match_threshold.is_finite() || self.match_threshold < 0.0 {
            return Err(ConfigError::Invalid {
                key: "match_threshold",
                value: self.match_threshold.to_string(),
            });
        }
        if self.embedding_dim == 0 {
            return Err(ConfigError::Invalid {
                key: "embedding_dim",
                value: "0".into(),
            });
        }
        if self.queue_depth == 0 {
            return Err(ConfigError::Invalid {
                key: "queue_depth",
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("facegate")
}

fn env_parse<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value: v }),
        Err(_) => Ok(None),
    }
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.listen.port(), 4000);
        assert_eq!(config.match_threshold, 0.6);
        assert_eq!(config.embedding_dim, 128);
        assert!(config.db_path.ends_with("facegate/identities.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            match_threshold = 0.45
            db_path = "/var/lib/facegate/ids.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.match_threshold, 0.45);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/facegate/ids.db"));
        assert_eq!(config.embedding_dim, 128);
        assert_eq!(config.queue_depth, 16);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::from_toml_str("treshold = 0.5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_negative_threshold_invalid() {
        let config = Config {
            match_threshold: -0.1,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { key: "match_threshold", .. })
        ));
    }

    #[test]
    fn test_zero_dim_invalid() {
        let config = Config {
            embedding_dim: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" http://a.test , ,http://b.test"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
    }
}
