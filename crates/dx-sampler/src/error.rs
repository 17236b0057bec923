use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SamplerError {
    #[error("non-finite combined logit {value} for token {token}")]
    NonFinite { token: u32, value: f32 },
    #[error("logit length mismatch: forward has {forward}, backward has {backward}")]
    LengthMismatch { forward: usize, backward: usize },
    #[error("every candidate token is blocked")]
    NoCandidates,
}

pub type Result<T> = std::result::Result<T, SamplerError>;
