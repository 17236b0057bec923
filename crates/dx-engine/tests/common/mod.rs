#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use async_trait::async_trait;
use dx_engine::{DualSession, EngineConfig, Generator};
use dx_model::{
    Feed, InferenceSession, KvCacheSpec, LayerCache, ModelConfig, ModelError, ModelSource,
    SessionBackend, SessionOptions, SessionOutputs,
};
use dx_tensor::{DType, Location, Shape, Tensor};

pub const VOCAB: usize = 16;
pub const LAYERS: usize = 2;

/// The token the chain model prefers after `token`.
pub fn successor(token: u32) -> u32 {
    (3 * token + 1) % VOCAB as u32
}

/// What a session saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub tokens: Vec<u32>,
    pub mask_len: usize,
    pub position_ids: Option<Vec<i64>>,
    pub cache_seq: Vec<usize>,
}

/// A scripted model: at every position the logit of token `i` is minus its
/// distance (mod vocab) from `successor(input[pos])`.
pub struct ChainModel {
    name: String,
    pub calls: Rc<RefCell<Vec<Call>>>,
    pub profiling_flushes: Rc<Cell<usize>>,
    fail_on_call: Option<usize>,
    poison_on_call: Option<usize>,
}

impl ChainModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Rc::new(RefCell::new(Vec::new())),
            profiling_flushes: Rc::new(Cell::new(0)),
            fail_on_call: None,
            poison_on_call: None,
        }
    }

    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    pub fn poisoned_on(mut self, call: usize) -> Self {
        self.poison_on_call = Some(call);
        self
    }

    fn logits_row(token: u32) -> Vec<f32> {
        let target = successor(token) as usize;
        (0..VOCAB)
            .map(|i| -(((i + VOCAB - target) % VOCAB) as f32))
            .collect()
    }
}

#[async_trait(?Send)]
impl InferenceSession for ChainModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, feed: &Feed) -> dx_model::Result<SessionOutputs> {
        let call_index = self.calls.borrow().len();
        let tokens = feed.tokens()?;
        self.calls.borrow_mut().push(Call {
            tokens: tokens.clone(),
            mask_len: feed.attention_mask().dims()[1],
            position_ids: feed
                .position_ids()
                .map(|p| p.data_i64().map(|d| d.to_vec()))
                .transpose()?,
            cache_seq: feed.cache().iter().map(LayerCache::seq_len).collect(),
        });

        if self.fail_on_call == Some(call_index) {
            return Err(ModelError::Session {
                session: self.name.clone(),
                message: "input_ids has unexpected shape".to_string(),
            });
        }

        let seq = tokens.len();
        let mut logits = Vec::with_capacity(seq * VOCAB);
        for &token in &tokens {
            logits.extend(Self::logits_row(token));
        }
        if self.poison_on_call == Some(call_index) {
            logits[(seq - 1) * VOCAB + 3] = f32::NAN;
        }

        let present = (0..feed.num_layers())
            .map(|_| {
                let t = Tensor::from_f32(vec![0.0; seq * 2], Shape::new(vec![1, 1, seq, 2]))?
                    .with_location(Location::GpuBuffer);
                Ok(LayerCache {
                    key: t.clone(),
                    value: t,
                })
            })
            .collect::<dx_model::Result<Vec<_>>>()?;

        Ok(SessionOutputs {
            logits: Tensor::from_f32(logits, Shape::new(vec![1, seq, VOCAB]))?,
            present,
        })
    }

    fn end_profiling(&self) {
        self.profiling_flushes.set(self.profiling_flushes.get() + 1);
    }
}

/// Creates chain models and remembers the options it was asked for.
#[derive(Default)]
pub struct ChainBackend {
    pub requested: RefCell<Vec<SessionOptions>>,
}

#[async_trait(?Send)]
impl SessionBackend for ChainBackend {
    async fn create_session(
        &self,
        model_bytes: &[u8],
        options: &SessionOptions,
    ) -> dx_model::Result<Box<dyn InferenceSession>> {
        self.requested.borrow_mut().push(options.clone());
        let name = String::from_utf8_lossy(model_bytes).into_owned();
        Ok(Box::new(ChainModel::new(&name)))
    }
}

pub fn cache_spec() -> KvCacheSpec {
    KvCacheSpec {
        num_layers: LAYERS,
        dims: Shape::new(vec![1, 1, 0, 2]),
        dtype: DType::F32,
    }
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        forward_cache: cache_spec(),
        backward_cache: cache_spec(),
        need_position_ids: true,
        profiling: false,
    }
}

pub fn generator(forward: ChainModel, backward: ChainModel) -> Generator {
    Generator::new(
        DualSession::new(Box::new(forward), Box::new(backward)),
        engine_config(),
    )
    .unwrap()
}

pub fn model_source(name: &str) -> ModelSource {
    ModelSource {
        name: name.to_string(),
        config: ModelConfig {
            num_hidden_layers: LAYERS,
            num_attention_heads: 1,
            hidden_size: 2,
            num_key_value_heads: None,
            vocab_size: Some(VOCAB),
        },
        bytes: name.as_bytes().to_vec(),
    }
}

/// True when no trigram occurs twice in `tokens`.
pub fn trigrams_unique(tokens: &[u32]) -> bool {
    let mut seen = std::collections::HashSet::new();
    tokens.windows(3).all(|w| seen.insert((w[0], w[1], w[2])))
}
