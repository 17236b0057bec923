pub mod candidate;
pub mod error;
pub mod greedy;
pub mod temperature;
pub mod top_k;
pub mod trigram;

pub use candidate::{combine, ensure_finite, Candidate, Combine};
pub use error::{Result, SamplerError};
pub use greedy::argmax;
pub use temperature::{softmax_with_temperature, GREEDY_TEMPERATURE};
pub use top_k::TopKSampler;
pub use trigram::TrigramBlocker;
