use serde::{Deserialize, Serialize};

/// Job store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobStoreConfig {
    /// Bound on relayer acceptance or wallet signing.
    pub submit_timeout_ms: u64,
    /// Bound from acceptance to a terminal state.
    pub watch_timeout_ms: u64,
    /// Keep at most this many jobs; only terminal ones are evicted.
    pub retention_limit: Option<usize>,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 60_000,
            watch_timeout_ms: 600_000,
            retention_limit: None,
        }
    }
}
