use std::path::PathBuf;

/// Core error type for the base finder.
///
/// Adapter crates map their specific errors into this type. Per-request
/// failures (quota, provider hiccups) never surface here; they are absorbed by
/// the aggregator. What remains is startup/configuration trouble and I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid channel list: {path}: {reason}")]
    ChannelList { path: PathBuf, reason: String },

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
