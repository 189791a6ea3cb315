//! Worker configuration, read from the environment.
//!
//! - `LINKAGE_BROKER_URL`: Disque endpoint (`redis://` or `disque://` scheme)
//! - `LINKAGE_INDEX_PATH`: optional JSON index snapshot for the in-memory resolvers

use std::path::{Path, PathBuf};

use tracing::warn;

use linkage_core::{AttributeIndex, IndexSnapshot};

pub const BROKER_URL_VAR: &str = "LINKAGE_BROKER_URL";
pub const INDEX_PATH_VAR: &str = "LINKAGE_INDEX_PATH";

/// Local Disque node on its default port.
pub const DEFAULT_BROKER_URL: &str = "redis://127.0.0.1:7711";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported broker url {0:?} (expected redis:// or disque://)")]
    InvalidBrokerUrl(String),

    #[error("failed to read index snapshot {path}: {source}")]
    ReadIndex {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse index snapshot {path}: {source}")]
    ParseIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Broker endpoint, normalized to the `redis://` scheme.
    pub broker_url: String,
    pub index_path: Option<PathBuf>,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let broker_url = match get(BROKER_URL_VAR) {
            Some(url) => normalize_broker_url(url.trim())?,
            None => {
                warn!("{BROKER_URL_VAR} not set; using {DEFAULT_BROKER_URL}");
                DEFAULT_BROKER_URL.to_string()
            }
        };

        Ok(Self {
            broker_url,
            index_path: get(INDEX_PATH_VAR).map(PathBuf::from),
        })
    }

    /// Load the configured snapshot, or an empty index when none is configured.
    pub fn load_index(&self) -> Result<AttributeIndex, ConfigError> {
        match &self.index_path {
            Some(path) => load_snapshot(path).map(AttributeIndex::from_snapshot),
            None => {
                warn!("{INDEX_PATH_VAR} not set; starting with an empty index");
                Ok(AttributeIndex::new())
            }
        }
    }
}

fn normalize_broker_url(url: &str) -> Result<String, ConfigError> {
    if let Some(rest) = url.strip_prefix("disque://") {
        return Ok(format!("redis://{rest}"));
    }
    if url.starts_with("redis://") {
        return Ok(url.to_string());
    }
    Err(ConfigError::InvalidBrokerUrl(url.to_string()))
}

fn load_snapshot(path: &Path) -> Result<IndexSnapshot, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadIndex {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&raw).map_err(|source| ConfigError::ParseIndex {
        path: path.to_path_buf(),
        source,
    })
}
