use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `[Solr]` section of the configuration surface (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolrConfig {
    pub update_url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub background_update: bool,
    #[serde(default = "default_commit_interval")]
    pub max_commit_interval: u64,
    #[serde(default = "default_max_update_records")]
    pub max_update_records: usize,
    #[serde(default = "default_max_update_size_kib")]
    pub max_update_size_kib: usize,
    /// Per-call timeout in seconds; `None` means infinite, matching the
    /// original default. `optimize`/`deleteDataSource` always use
    /// `long_call_timeout_secs` regardless of this value.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_long_timeout")]
    pub long_call_timeout_secs: u64,
    /// Explicit opt-in required to disable TLS peer verification
    /// (spec §9: "default secure in a rewrite and document the migration").
    #[serde(default)]
    pub danger_accept_invalid_certs: bool,
}

fn default_commit_interval() -> u64 {
    50_000
}

fn default_max_update_records() -> usize {
    5_000
}

fn default_max_update_size_kib() -> usize {
    1_024
}

fn default_long_timeout() -> u64 {
    3_600
}

impl SolrConfig {
    pub fn max_update_size_bytes(&self) -> usize {
        self.max_update_size_kib * 1024
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn long_call_timeout(&self) -> Duration {
        Duration::from_secs(self.long_call_timeout_secs)
    }
}
