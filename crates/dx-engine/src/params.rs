use dx_model::{KvCacheSpec, ModelConfig};
use dx_tensor::DType;

use crate::error::{EngineError, Result};

/// Upper bound on a single request's token budget.
pub const MAX_TOKENS_LIMIT: usize = 9999;

/// Decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// One sequence; each step takes the argmax of `forward + backward`.
    Greedy,
    /// `beam_size` sequences; each step samples `beam_size + 1` children per
    /// beam by `min(forward, backward)` at `temperature`.
    Beam { beam_size: usize, temperature: f32 },
}

/// Parameters of one `generate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    /// Token budget, counted after the start symbol and including the prompt.
    pub max_tokens: usize,
    pub strategy: Strategy,
    /// Seed for beam sampling. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for GenerateParams {
    fn default() -> Self {
        Self {
            max_tokens: 64,
            strategy: Strategy::Greedy,
            seed: None,
        }
    }
}

impl GenerateParams {
    pub fn greedy(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }

    pub fn beam(max_tokens: usize, beam_size: usize, temperature: f32) -> Self {
        Self {
            max_tokens,
            strategy: Strategy::Beam {
                beam_size,
                temperature,
            },
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_tokens > MAX_TOKENS_LIMIT {
            return Err(EngineError::InvalidParams(format!(
                "max_tokens {} exceeds the limit of {}",
                self.max_tokens, MAX_TOKENS_LIMIT
            )));
        }
        if let Strategy::Beam {
            beam_size,
            temperature,
        } = self.strategy
        {
            if beam_size == 0 {
                return Err(EngineError::InvalidParams(
                    "beam_size must be at least 1".to_string(),
                ));
            }
            if !temperature.is_finite() || temperature < 0.0 {
                return Err(EngineError::InvalidParams(format!(
                    "temperature must be finite and non-negative, got {}",
                    temperature
                )));
            }
        }
        Ok(())
    }
}

/// Static configuration of a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Cache layout of the forward model's feed.
    pub forward_cache: KvCacheSpec,
    /// Cache layout of the backward model's feed.
    pub backward_cache: KvCacheSpec,
    /// Whether the model family takes `position_ids`.
    pub need_position_ids: bool,
    /// Profiling mode; progress callbacks are suppressed.
    pub profiling: bool,
}

impl EngineConfig {
    pub fn from_configs(forward: &ModelConfig, backward: &ModelConfig, dtype: DType) -> Self {
        Self {
            forward_cache: KvCacheSpec::from_config(forward, dtype),
            backward_cache: KvCacheSpec::from_config(backward, dtype),
            need_position_ids: true,
            profiling: false,
        }
    }
}
