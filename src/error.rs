//! Typed errors for the wire and block-transfer layers.
//!
//! Protocol violations are never fatal to a process (see spec §7): callers at
//! the dispatch boundary log these and move on to the next message.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),

    #[error("malformed fields for verb {verb}: {detail}")]
    MalformedFields { verb: &'static str, detail: String },

    #[error("empty message")]
    Empty,

    #[error("invalid index or count: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(#[from] std::num::ParseFloatError),

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("digest mismatch for {filename} block {index}/{total}")]
    CorruptBlock {
        filename: String,
        index: u64,
        total: u64,
    },

    #[error("no cached block for {filename} index {index}; cannot resend")]
    MissingCacheEntry { filename: String, index: u64 },

    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
