use thiserror::Error;

/// Failures of a reduction call. Both are fatal to the call; retrying with the
/// same input fails the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReduceError {
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// A collective exchange did not complete for every participant.
    #[error("Communication failure: {0}")]
    CommunicationFailure(String),
}

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("Syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Dataset contains no records")]
    Empty,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
