use thiserror::Error;

/// Failures reported by an engine backend (the native audio stack).
///
/// Backends map their native status codes onto these variants; anything
/// without a dedicated variant is carried verbatim in `Os`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine client not initialized")]
    NotInitialized,

    #[error("device invalidated")]
    DeviceInvalidated,

    #[error("unsupported format")]
    UnsupportedFormat,

    #[error("requested frames exceed the free space in the engine buffer")]
    BufferTooLarge,

    #[error("buffer calls out of order")]
    OutOfOrder,

    #[error("release size does not match the acquired region")]
    InvalidSize,

    #[error("{context} failed (0x{code:08X}): {message}")]
    Os {
        context: String,
        code: i32,
        message: String,
    },
}

impl EngineError {
    /// Whether retrying the same call later can succeed without re-negotiating.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::BufferTooLarge)
    }
}

/// Errors surfaced by stream sessions and the enumerator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Engine connection or session negotiation could not be established.
    /// Not retryable without re-enumerating.
    #[error("initialization failed: {0}")]
    InitializationFailure(String),

    /// No buffer space or data right now; poll again.
    #[error("temporarily unavailable: {0}")]
    TransientUnavailable(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

impl StreamError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientUnavailable(_))
    }

    /// Classify an engine failure that happened during a buffer transfer.
    pub(crate) fn from_transfer(err: EngineError) -> Self {
        if err.is_transient() {
            Self::TransientUnavailable(err.to_string())
        } else {
            Self::Engine(err)
        }
    }

    /// Wrap an engine failure that happened while negotiating a session.
    pub(crate) fn negotiation(step: &str, err: EngineError) -> Self {
        Self::InitializationFailure(format!("{step}: {err}"))
    }
}
