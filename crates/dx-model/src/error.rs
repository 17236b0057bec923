use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid model config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid model config: {0}")]
    InvalidConfig(String),
    #[error("missing session output: {0}")]
    MissingOutput(String),
    #[error("cache layout mismatch: feed holds {expected} layers, outputs carry {got}")]
    CacheLayout { expected: usize, got: usize },
    #[error("invalid logits tensor: {0}")]
    InvalidLogits(String),
    #[error("inference session '{session}' failed: {message}")]
    Session { session: String, message: String },
    #[error("tensor error: {0}")]
    TensorError(#[from] dx_tensor::TensorError),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
