use thiserror::Error;

/// Engine error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal state is corrupted; nothing derived from it may be emitted.
    #[error("Invariant violated for {symbol}: {detail}")]
    Invariant { symbol: String, detail: String },
}

impl EngineError {
    pub fn invariant(symbol: &str, detail: impl Into<String>) -> Self {
        EngineError::Invariant {
            symbol: symbol.to_string(),
            detail: detail.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
