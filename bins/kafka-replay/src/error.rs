use replay_api::error::ClientError;
use replay_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        CliError::Config(msg.into())
    }

    /// Attach a path to an I/O failure.
    pub fn io_at(path: &std::path::Path, e: std::io::Error) -> Self {
        CliError::Io(std::io::Error::new(e.kind(), format!("'{}': {e}", path.display())))
    }
}
