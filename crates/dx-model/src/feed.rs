//! Tensor feeds: the complete input bundle for one inference call.
//!
//! A [`Feed`] has a fixed schema: token ids, attention mask, optional position
//! ids, and an ordered list of per-layer key/value caches. Cache tensors are
//! owned by exactly one feed slot at a time; [`Feed::update`] moves the
//! session's `present.*` outputs into the `past_key_values.*` slots and
//! disposes whatever they replace.

use std::fmt;

use dx_tensor::{Tensor, TensorError};

use crate::config::KvCacheSpec;
use crate::error::{ModelError, Result};

/// Which half of a layer cache a slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Key,
    Value,
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKind::Key => write!(f, "key"),
            CacheKind::Value => write!(f, "value"),
        }
    }
}

/// A named cache slot, identified by layer index and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheSlot {
    pub layer: usize,
    pub kind: CacheKind,
}

impl CacheSlot {
    const INPUT_PREFIX: &'static str = "past_key_values";
    const OUTPUT_PREFIX: &'static str = "present";

    pub fn new(layer: usize, kind: CacheKind) -> Self {
        CacheSlot { layer, kind }
    }

    /// Feed name of this slot, e.g. `past_key_values.3.key`.
    pub fn input_name(&self) -> String {
        format!("{}.{}.{}", Self::INPUT_PREFIX, self.layer, self.kind)
    }

    /// Session output name of this slot, e.g. `present.3.key`.
    pub fn output_name(&self) -> String {
        format!("{}.{}.{}", Self::OUTPUT_PREFIX, self.layer, self.kind)
    }

    /// Parse a session output name. Returns `None` for non-cache outputs.
    pub fn parse_output_name(name: &str) -> Option<CacheSlot> {
        let rest = name.strip_prefix(Self::OUTPUT_PREFIX)?.strip_prefix('.')?;
        let (layer, kind) = rest.split_once('.')?;
        let layer = layer.parse().ok()?;
        let kind = match kind {
            "key" => CacheKind::Key,
            "value" => CacheKind::Value,
            _ => return None,
        };
        Some(CacheSlot { layer, kind })
    }
}

/// Key and value cache tensors for one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerCache {
    pub key: Tensor,
    pub value: Tensor,
}

impl LayerCache {
    /// Length of the cached sequence axis (axis 2 of `[1, heads, seq, head_dim]`).
    pub fn seq_len(&self) -> usize {
        self.key.dims().get(2).copied().unwrap_or(0)
    }

    pub fn dispose(self) {
        self.key.dispose();
        self.value.dispose();
    }
}

/// The input bundle for one direction's inference session.
///
/// `Clone` deep-copies every tensor, cache included, so a cloned feed never
/// aliases the original's device buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    input_ids: Tensor,
    attention_mask: Tensor,
    position_ids: Option<Tensor>,
    cache: Vec<LayerCache>,
}

impl Feed {
    /// Build a feed with empty key/value caches and an empty sequence.
    pub fn initialize(spec: &KvCacheSpec) -> Result<Feed> {
        Ok(Feed {
            input_ids: Tensor::token_row(&[]),
            attention_mask: Tensor::ones_row(0),
            position_ids: None,
            cache: empty_cache(spec)?,
        })
    }

    /// Dispose every cache tensor this feed holds and start over from empty
    /// caches.
    pub fn reinitialize(&mut self, spec: &KvCacheSpec) -> Result<()> {
        let fresh = empty_cache(spec)?;
        for old in std::mem::replace(&mut self.cache, fresh) {
            old.dispose();
        }
        self.input_ids = Tensor::token_row(&[]);
        self.attention_mask = Tensor::ones_row(0);
        self.position_ids = None;
        Ok(())
    }

    /// Install a step's `present` caches, disposing the tensors they replace.
    ///
    /// Every layer must be supplied; a partial update would leave stale
    /// caches next to fresh ones.
    pub fn update(&mut self, present: Vec<LayerCache>) -> Result<()> {
        if present.len() != self.cache.len() {
            return Err(ModelError::CacheLayout {
                expected: self.cache.len(),
                got: present.len(),
            });
        }
        for (slot, fresh) in self.cache.iter_mut().zip(present) {
            std::mem::replace(&mut slot.key, fresh.key).dispose();
            std::mem::replace(&mut slot.value, fresh.value).dispose();
        }
        Ok(())
    }

    /// Set the token sequence this feed presents to the session.
    ///
    /// Rebuilds `input_ids`, an all-ones `attention_mask` of the same length
    /// and, when `with_position_ids` is set, positions `0..len`.
    pub fn set_sequence(&mut self, tokens: &[u32], with_position_ids: bool) {
        self.input_ids = Tensor::token_row(tokens);
        self.attention_mask = Tensor::ones_row(tokens.len());
        self.position_ids = with_position_ids.then(|| Tensor::arange_row(tokens.len()));
    }

    pub fn input_ids(&self) -> &Tensor {
        &self.input_ids
    }

    pub fn attention_mask(&self) -> &Tensor {
        &self.attention_mask
    }

    pub fn position_ids(&self) -> Option<&Tensor> {
        self.position_ids.as_ref()
    }

    /// Cache tensors in layer order.
    pub fn cache(&self) -> &[LayerCache] {
        &self.cache
    }

    pub fn num_layers(&self) -> usize {
        self.cache.len()
    }

    /// Number of tokens in `input_ids`.
    pub fn seq_len(&self) -> usize {
        self.input_ids.dims().get(1).copied().unwrap_or(0)
    }

    /// Token ids currently in the feed.
    pub fn tokens(&self) -> Result<Vec<u32>> {
        self.input_ids
            .data_i64()?
            .iter()
            .map(|&t| {
                u32::try_from(t).map_err(|_| {
                    ModelError::TensorError(TensorError::Other(format!("invalid token id {}", t)))
                })
            })
            .collect()
    }

    /// The feed as wire-named tensors, in a stable order.
    pub fn named(&self) -> Vec<(String, &Tensor)> {
        let mut named = Vec::with_capacity(3 + 2 * self.cache.len());
        named.push(("input_ids".to_string(), &self.input_ids));
        named.push(("attention_mask".to_string(), &self.attention_mask));
        if let Some(pos) = &self.position_ids {
            named.push(("position_ids".to_string(), pos));
        }
        for (layer, cache) in self.cache.iter().enumerate() {
            named.push((CacheSlot::new(layer, CacheKind::Key).input_name(), &cache.key));
            named.push((CacheSlot::new(layer, CacheKind::Value).input_name(), &cache.value));
        }
        named
    }

    /// Release every tensor the feed holds.
    pub fn dispose(self) {
        for layer in self.cache {
            layer.dispose();
        }
    }
}

fn empty_cache(spec: &KvCacheSpec) -> Result<Vec<LayerCache>> {
    (0..spec.num_layers)
        .map(|_| {
            Ok(LayerCache {
                key: Tensor::empty(spec.dtype, spec.dims.clone())?,
                value: Tensor::empty(spec.dtype, spec.dims.clone())?,
            })
        })
        .collect()
}
