use std::fmt;

use replay_api::error::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The recording cannot be decoded past this point.
    #[error("corrupt frame at byte {offset}: {detail}")]
    CorruptFrame { offset: u64, detail: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("client error: {0}")]
    Client(#[from] ClientError),
}

impl EngineError {
    /// Add context to the error.
    ///
    /// For `Client` variant, context is added to the inner `ClientError`.
    /// For `Config`, context is prepended to the message.
    pub fn with_context(self, ctx: impl fmt::Display) -> Self {
        match self {
            EngineError::Client(e) => EngineError::Client(e.with_context(ctx)),
            EngineError::Config(msg) => EngineError::Config(format!("{ctx}: {msg}")),
            EngineError::Io(e) => EngineError::Io(std::io::Error::new(e.kind(), format!("{ctx}: {e}"))),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, EngineError::CorruptFrame { .. })
    }
}

/// A run that stopped early, together with what it had done by then.
///
/// Returned by both engines so callers can report partial progress after a
/// cancellation or a collaborator failure.
#[derive(Debug)]
pub struct Aborted<S> {
    pub stats: S,
    pub error: EngineError,
}

impl<S> Aborted<S> {
    pub fn new(stats: S, error: EngineError) -> Self {
        Self { stats, error }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.is_cancelled()
    }
}

impl<S> fmt::Display for Aborted<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl<S: fmt::Debug> std::error::Error for Aborted<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
