//! The interface to the external neural-network execution engine.
//!
//! Sessions are opaque: they accept a [`Feed`] and return [`SessionOutputs`].
//! Nothing in this workspace executes tensor math.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use async_trait::async_trait;
use dx_tensor::{Location, Tensor};

use crate::config::ModelConfig;
use crate::error::{ModelError, Result};
use crate::feed::{CacheKind, CacheSlot, Feed, LayerCache};

/// Execution target for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionProvider {
    #[default]
    WebGpu,
    Wasm,
}

impl ExecutionProvider {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionProvider::WebGpu => "webgpu",
            ExecutionProvider::Wasm => "wasm",
        }
    }

    pub fn from_name(name: &str) -> Option<ExecutionProvider> {
        match name {
            "webgpu" => Some(ExecutionProvider::WebGpu),
            "wasm" => Some(ExecutionProvider::Wasm),
            _ => None,
        }
    }

    /// Whether this provider can run f16 caches at all. The wasm provider
    /// always runs in f32.
    pub fn supports_f16(&self) -> bool {
        matches!(self, ExecutionProvider::WebGpu)
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Options passed to [`SessionBackend::create_session`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionOptions {
    pub execution_provider: ExecutionProvider,
    /// Preferred placement of named outputs, keyed by output name.
    pub preferred_output_location: BTreeMap<String, Location>,
    pub profiling: bool,
}

impl SessionOptions {
    /// Options for a model: on WebGPU every `present.{i}.key|value` output
    /// stays on the device so it can be fed straight back as the next
    /// step's cache.
    pub fn for_model(
        config: &ModelConfig,
        provider: ExecutionProvider,
        profiling: bool,
    ) -> SessionOptions {
        let mut preferred_output_location = BTreeMap::new();
        if provider == ExecutionProvider::WebGpu {
            for layer in 0..config.num_hidden_layers {
                for kind in [CacheKind::Key, CacheKind::Value] {
                    preferred_output_location.insert(
                        CacheSlot::new(layer, kind).output_name(),
                        Location::GpuBuffer,
                    );
                }
            }
        }
        SessionOptions {
            execution_provider: provider,
            preferred_output_location,
            profiling,
        }
    }
}

/// The outputs of one inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOutputs {
    /// `[1, seq_len, vocab_size]` logits.
    pub logits: Tensor,
    /// Updated caches in layer order.
    pub present: Vec<LayerCache>,
}

impl SessionOutputs {
    /// Assemble outputs from a string-keyed map as returned by a runtime.
    ///
    /// Requires `logits` and a complete `present.{i}.key|value` pair for every
    /// layer from 0 up to the highest layer seen. Other outputs are dropped.
    pub fn from_named(mut named: HashMap<String, Tensor>) -> Result<SessionOutputs> {
        let logits = named
            .remove("logits")
            .ok_or_else(|| ModelError::MissingOutput("logits".to_string()))?;

        let mut keys: BTreeMap<usize, Tensor> = BTreeMap::new();
        let mut values: BTreeMap<usize, Tensor> = BTreeMap::new();
        for (name, tensor) in named {
            match CacheSlot::parse_output_name(&name) {
                Some(CacheSlot {
                    layer,
                    kind: CacheKind::Key,
                }) => {
                    keys.insert(layer, tensor);
                }
                Some(CacheSlot {
                    layer,
                    kind: CacheKind::Value,
                }) => {
                    values.insert(layer, tensor);
                }
                None => tracing::debug!(output = %name, "ignoring non-cache session output"),
            }
        }

        let num_layers = keys
            .keys()
            .chain(values.keys())
            .max()
            .map_or(0, |&max| max + 1);
        let mut present = Vec::with_capacity(num_layers);
        for layer in 0..num_layers {
            let key = keys.remove(&layer).ok_or_else(|| {
                ModelError::MissingOutput(CacheSlot::new(layer, CacheKind::Key).output_name())
            })?;
            let value = values.remove(&layer).ok_or_else(|| {
                ModelError::MissingOutput(CacheSlot::new(layer, CacheKind::Value).output_name())
            })?;
            present.push(LayerCache { key, value });
        }

        Ok(SessionOutputs { logits, present })
    }

    /// `(seq_len, vocab_size)` of the logits tensor.
    pub fn logits_dims(&self) -> Result<(usize, usize)> {
        match self.logits.dims() {
            &[1, seq_len, vocab] if seq_len > 0 && vocab > 0 => Ok((seq_len, vocab)),
            dims => Err(ModelError::InvalidLogits(format!(
                "expected [1, seq_len, vocab], got {:?}",
                dims
            ))),
        }
    }

    /// Logits of every position, flattened row-major as `[seq_len * vocab]`.
    pub fn all_logits(&self) -> Result<Vec<f32>> {
        self.logits_dims()?;
        Ok(self.logits.to_f32()?.into_owned())
    }

    /// Logits of the final sequence position.
    pub fn last_logits(&self) -> Result<Vec<f32>> {
        let (seq_len, vocab) = self.logits_dims()?;
        let data = self.logits.to_f32()?;
        let start = vocab * (seq_len - 1);
        Ok(data[start..start + vocab].to_vec())
    }

    /// Hand the cache tensors over, releasing the logits.
    pub fn into_present(self) -> Vec<LayerCache> {
        self.logits.dispose();
        self.present
    }
}

/// A loaded model that runs one inference call per `run`.
///
/// Futures are not `Send`: sessions live on a single-threaded executor
/// (browser event loop, wasm).
#[async_trait(?Send)]
pub trait InferenceSession {
    /// Returns a name for logs and errors.
    fn name(&self) -> &str;

    /// Run one inference call. Fails on malformed feeds or backend errors.
    async fn run(&self, feed: &Feed) -> Result<SessionOutputs>;

    /// Flush profiling data, if the session was created with profiling.
    fn end_profiling(&self) {}
}

/// Creates sessions from serialized model bytes.
#[async_trait(?Send)]
pub trait SessionBackend {
    async fn create_session(
        &self,
        model_bytes: &[u8],
        options: &SessionOptions,
    ) -> Result<Box<dyn InferenceSession>>;
}

/// A model ready to be turned into a session: its config and weights.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub name: String,
    pub config: ModelConfig,
    pub bytes: Vec<u8>,
}
