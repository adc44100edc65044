// src/error.rs
//
// Crate-wide error type.
//
// Every fallible operation on a channel returns `PChannelError` rather than
// panicking. The four kinds mirror the error taxonomy the engine is required
// to surface: bad configuration, filesystem failures, payload decode
// failures, and lifecycle misuse.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum PChannelError {
    /// Invalid bounds, missing directory, or a nil codec passed to `init`.
    #[error("invalid channel configuration: {0}")]
    Config(String),

    /// A file write, read, delete, listdir, or mkdir failed.
    #[error("channel I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `deserialize` failed during recovery, refill, or a direct `get`.
    #[error("failed to decode message {id}: {reason}")]
    Decode { id: String, reason: String },

    /// Calling an operation in a state the engine does not support.
    #[error("channel misuse: {0}")]
    Lifecycle(String),
}

impl PChannelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PChannelError::Io {
            path: path.into(),
            source,
        }
    }
}
