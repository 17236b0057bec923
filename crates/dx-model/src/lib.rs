pub mod config;
pub mod error;
pub mod feed;
pub mod session;
pub mod tokenizer;

pub use config::{KvCacheSpec, ModelConfig};
pub use error::{ModelError, Result};
pub use feed::{CacheKind, CacheSlot, Feed, LayerCache};
pub use session::{
    ExecutionProvider, InferenceSession, ModelSource, SessionBackend, SessionOptions,
    SessionOutputs,
};
pub use tokenizer::HiraganaVocab;
