//! Probe process configuration
//!
//! Runtime knobs for the probe binary, loaded from `PROBE_`-prefixed
//! environment variables with sane defaults. The cluster target itself is
//! described by [`probe_lib::TargetConfig`], built in `main` from CLI flags
//! or a target file.

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Port for the health/metrics API server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds between discovery cycles
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// Per-request HTTP timeout towards masters and agents
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Discovery worker fan-out (agent groups polled in parallel)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
}

fn default_api_port() -> u16 {
    8080
}

fn default_discovery_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    30
}

fn default_worker_count() -> usize {
    probe_lib::discovery::DEFAULT_WORKER_COUNT
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            discovery_interval_secs: default_discovery_interval(),
            request_timeout_secs: default_request_timeout(),
            worker_count: default_worker_count(),
        }
    }
}

impl ProbeConfig {
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PROBE"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_default())
    }
}
