//! Error types for Hermes

use std::io;

use thiserror::Error;

/// Core Hermes errors
#[derive(Error, Debug)]
pub enum HermesError {
    // Transport errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    // Wire errors
    #[error("cannot decode message: {0}")]
    Decode(String),

    #[error("cannot encode message: {0}")]
    Encode(String),

    #[error("unexpected end of stream inside a message")]
    UnexpectedEof,

    #[error("frame too large: {size} bytes buffered, limit is {max}")]
    FrameTooLarge { size: usize, max: usize },

    // Protocol errors
    #[error("unknown client type: {0:?}")]
    UnknownClientType(String),

    // Configuration errors
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<serde_json::Error> for HermesError {
    fn from(err: serde_json::Error) -> Self {
        HermesError::Decode(err.to_string())
    }
}

/// Result type for Hermes operations
pub type HermesResult<T> = Result<T, HermesError>;
