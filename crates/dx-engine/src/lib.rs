//! `dx-engine` - Dual-direction sequence generation.
//!
//! Drives a forward and a backward language model session step by step,
//! merges their logits, blocks repeated trigrams, and decodes either greedily
//! or with beam search ranked by forward-model perplexity.

pub mod beam;
pub mod beam_search;
pub mod cancel;
pub mod error;
pub mod generator;
pub mod greedy;
pub mod params;
pub mod perplexity;
pub mod runner;
pub mod sequence;

pub use beam::Beam;
pub use beam_search::{BeamSettings, Finalist};
pub use cancel::CancelToken;
pub use error::{EngineError, Result};
pub use generator::{GenerationReport, GenerationState, Generator, LoadOptions};
pub use greedy::Outcome;
pub use params::{EngineConfig, GenerateParams, Strategy};
pub use perplexity::perplexity;
pub use runner::{DualSession, FeedPair, StepOutputs};
pub use sequence::mirrored;

/// Streaming callback: receives the mirrored token list after every step.
pub type Progress<'a> = Option<&'a mut dyn FnMut(&[u32])>;
