use std::fmt;

/// Errors surfaced by the splice engine.
///
/// `BufferFull`, `Processing`, and `EndOfStream` are deliberately absent here:
/// they are control-flow signals resolved internally (see [`crate::stream::ProcessResult`])
/// and never escape to a caller.
#[derive(thiserror::Error, Debug)]
pub enum SquashError {
    #[error("unknown codec: {0}")]
    BadParam(String),

    #[error("allocation failed")]
    Memory,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec rejected input buffer")]
    InvalidBuffer,

    #[error("codec-internal failure: {0}")]
    Failed(String),

    #[error("unable to load codec: {0}")]
    UnableToLoad(String),
}

impl SquashError {
    pub fn failed(msg: impl Into<String>) -> Self {
        SquashError::Failed(msg.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SquashError>;

/// Internal-only signal returned by buffer-transform tiers that need a bigger
/// output allocation. Never reaches [`SquashError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BufferFull;

impl fmt::Display for BufferFull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "output buffer too small")
    }
}
