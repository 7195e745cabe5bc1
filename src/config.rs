use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Durations are written as whole seconds in config files
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Bounds for the in-memory feed content cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries older than this are treated as absent
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    /// Maximum number of cached feeds
    pub max_entries: usize,
    /// Maximum total size of cached feed content
    pub max_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            max_entries: 32,
            max_bytes: 64 * 1024 * 1024,
        }
    }
}

/// Retry behavior for transient fetch failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first
    pub max_retries: u32,
    /// Delay before the second attempt; doubles per attempt afterwards
    #[serde(with = "duration_secs")]
    pub base_delay: Duration,
    /// Cap applied to every backoff delay
    #[serde(with = "duration_secs")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Engine configuration, read once at orchestrator construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for downloaded media and archived metadata
    pub downloads_dir: PathBuf,
    pub cache: CacheConfig,
    pub retry: RetryConfig,
    /// Number of staged episode updates per database transaction
    pub batch_size: usize,
    /// Pause between episodes during a bulk download
    #[serde(with = "duration_secs")]
    pub episode_delay: Duration,
    /// Timeout applied to every network request
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            downloads_dir: PathBuf::from("downloads"),
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            batch_size: 10,
            episode_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}
