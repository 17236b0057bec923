use std::path::Path;

use dx_tensor::{DType, Shape};
use serde::Deserialize;

use crate::error::{ModelError, Result};

/// Transformer hyperparameters read from a model's `config.json`.
///
/// GPT-2 style keys (`n_layer`, `n_head`, `n_embd`) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    /// Number of transformer layers; one key and one value cache per layer.
    #[serde(alias = "n_layer")]
    pub num_hidden_layers: usize,
    /// Number of query attention heads.
    #[serde(alias = "n_head")]
    pub num_attention_heads: usize,
    /// Embedding dimension / hidden size.
    #[serde(alias = "n_embd")]
    pub hidden_size: usize,
    /// Number of key/value heads. Defaults to `num_attention_heads`.
    #[serde(default)]
    pub num_key_value_heads: Option<usize>,
    /// Vocabulary size, when the config records it.
    #[serde(default)]
    pub vocab_size: Option<usize>,
}

impl ModelConfig {
    /// Parse and validate a config from JSON text.
    pub fn from_json(text: &str) -> Result<ModelConfig> {
        let config: ModelConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<ModelConfig> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Number of key/value heads.
    pub fn kv_heads(&self) -> usize {
        self.num_key_value_heads.unwrap_or(self.num_attention_heads)
    }

    /// Dimension of each attention head (hidden_size / num_attention_heads).
    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.num_attention_heads
    }

    fn validate(&self) -> Result<()> {
        if self.num_hidden_layers == 0 {
            return Err(ModelError::InvalidConfig(
                "num_hidden_layers must be positive".to_string(),
            ));
        }
        if self.num_attention_heads == 0 || self.hidden_size % self.num_attention_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "hidden_size {} is not divisible by num_attention_heads {}",
                self.hidden_size, self.num_attention_heads
            )));
        }
        if self.kv_heads() == 0 {
            return Err(ModelError::InvalidConfig(
                "num_key_value_heads must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Layout of the per-layer key/value cache tensors in a feed.
#[derive(Debug, Clone, PartialEq)]
pub struct KvCacheSpec {
    /// Number of layers (one key and one value slot each).
    pub num_layers: usize,
    /// Shape of an empty cache: `[1, kv_heads, 0, head_dim]`.
    pub dims: Shape,
    /// Element type of cache tensors.
    pub dtype: DType,
}

impl KvCacheSpec {
    /// Derive the empty-cache layout from a model config.
    pub fn from_config(config: &ModelConfig, dtype: DType) -> KvCacheSpec {
        KvCacheSpec {
            num_layers: config.num_hidden_layers,
            dims: Shape::new(vec![1, config.kv_heads(), 0, config.head_dim()]),
            dtype,
        }
    }
}
