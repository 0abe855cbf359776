use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("audit write failed: {0}")]
    Audit(#[from] std::io::Error),
    #[error("timestamp format error: {0}")]
    Timestamp(#[from] time::error::Format),
    #[error("watch channel send failed")]
    WatchSend,
    #[error("state lock poisoned")]
    StateLock,
}

/// Transport-level failure while checking reachability. A device that simply
/// does not answer is `Ok(false)`, never one of these.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },
    #[error("failed to read arp table {path}: {source}")]
    ArpTable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("probe error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u128 },
    #[error("{program} exited with status {code:?}")]
    Exit { program: String, code: Option<i32> },
    #[error("actuator error: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("invalid coordinates: lat {latitude}, lon {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },
    #[error("clock error: {0}")]
    Clock(String),
}
