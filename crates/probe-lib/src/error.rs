//! Error types for the probe library
//!
//! All fallible library operations return [`Result`] with this crate's
//! [`Error`]. The binary wraps these in `anyhow` at its boundary.

/// Error returned by probe library functions
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Target configuration failed validation
    #[error("invalid target configuration: {0}")]
    Config(String),

    /// Transport-level failure talking to a master or agent
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Login rejected by the master
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Unexpected HTTP status or empty body
    #[error("protocol error (status {status}): {message}")]
    Protocol { status: u16, message: String },

    /// Response body did not decode into the expected JSON shape
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Semantically invalid document (required fields missing)
    #[error("parse error: {0}")]
    Parse(String),

    /// Every configured master endpoint failed the election
    #[error("no reachable mesos leader among [{0}]")]
    LeaderUnavailable(String),

    /// Agent returned an empty statistics response
    #[error("empty stats response from agent {0}")]
    MissingStats(String),

    /// Executor in the stats response matched no known task
    #[error("executor {executor_id} (source {source_id}) matches no task on agent {agent_id}")]
    UnknownExecutor {
        agent_id: String,
        executor_id: String,
        source_id: String,
    },

    /// URL assembly failed for an endpoint
    #[error("bad endpoint url: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
