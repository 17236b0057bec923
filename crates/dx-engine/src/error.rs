use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("model error: {0}")]
    Model(#[from] dx_model::ModelError),
    #[error("sampler error: {0}")]
    Sampler(#[from] dx_sampler::SamplerError),
    #[error("invalid generation parameters: {0}")]
    InvalidParams(String),
    #[error("sequence of {0} tokens is too short to score")]
    SequenceTooShort(usize),
    #[error("token {token} is outside the vocabulary of {vocab}")]
    TokenOutOfRange { token: u32, vocab: usize },
}

pub type Result<T> = std::result::Result<T, EngineError>;
