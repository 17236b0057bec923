use dx_model::{Feed, InferenceSession, KvCacheSpec, SessionOutputs};

use crate::error::Result;
use crate::sequence::backward_sequence;

/// Forward and backward feeds that advance together.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPair {
    pub forward: Feed,
    pub backward: Feed,
}

impl FeedPair {
    pub fn initialize(forward: &KvCacheSpec, backward: &KvCacheSpec) -> Result<Self> {
        Ok(Self {
            forward: Feed::initialize(forward)?,
            backward: Feed::initialize(backward)?,
        })
    }

    /// Drop all cached state and return to empty caches.
    pub fn reinitialize(&mut self, forward: &KvCacheSpec, backward: &KvCacheSpec) -> Result<()> {
        self.forward.reinitialize(forward)?;
        self.backward.reinitialize(backward)?;
        Ok(())
    }

    /// Present the forward sequence to both directions. The backward input
    /// is rebuilt from the whole sequence each time.
    pub fn prepare(&mut self, forward_tokens: &[u32], with_position_ids: bool) {
        self.forward.set_sequence(forward_tokens, with_position_ids);
        self.backward
            .set_sequence(&backward_sequence(forward_tokens), with_position_ids);
    }

    /// Move a step's caches into the feeds.
    pub fn update(&mut self, outputs: StepOutputs) -> Result<()> {
        self.forward.update(outputs.forward.into_present())?;
        self.backward.update(outputs.backward.into_present())?;
        Ok(())
    }

    pub fn dispose(self) {
        self.forward.dispose();
        self.backward.dispose();
    }
}

/// Outputs of one step in both directions.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutputs {
    pub forward: SessionOutputs,
    pub backward: SessionOutputs,
}

impl StepOutputs {
    /// Final-position logits of `(forward, backward)`.
    pub fn last_logits(&self) -> Result<(Vec<f32>, Vec<f32>)> {
        Ok((self.forward.last_logits()?, self.backward.last_logits()?))
    }
}

/// The two independently loaded sessions.
pub struct DualSession {
    forward: Box<dyn InferenceSession>,
    backward: Box<dyn InferenceSession>,
}

impl DualSession {
    pub fn new(forward: Box<dyn InferenceSession>, backward: Box<dyn InferenceSession>) -> Self {
        Self { forward, backward }
    }

    pub fn forward(&self) -> &dyn InferenceSession {
        self.forward.as_ref()
    }

    pub fn backward(&self) -> &dyn InferenceSession {
        self.backward.as_ref()
    }

    /// Run one inference call per direction. Both must succeed before the
    /// caller merges logits; any failure is returned as is.
    pub async fn step(&self, feeds: &FeedPair) -> Result<StepOutputs> {
        let forward = self.forward.run(&feeds.forward).await?;
        let backward = self.backward.run(&feeds.backward).await?;
        Ok(StepOutputs { forward, backward })
    }

    pub fn end_profiling(&self) {
        self.forward.end_profiling();
        self.backward.end_profiling();
    }
}
