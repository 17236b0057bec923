use dx_model::KvCacheSpec;
use dx_sampler::{Candidate, TrigramBlocker};

use crate::error::Result;
use crate::runner::{FeedPair, StepOutputs};
use crate::sequence::{content_len, forward_sequence};

/// One partial sequence tracked by beam search.
///
/// A beam owns its feeds and blocker table outright. `Clone` deep-copies
/// both, so siblings never share a cache tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    tokens: Vec<u32>,
    feeds: FeedPair,
    score: f32,
    blocker: TrigramBlocker,
}

impl Beam {
    /// The starting beam: empty caches, zero score, and a blocker seeded with
    /// every trigram of the prompt.
    pub fn new(prompt: &[u32], forward: &KvCacheSpec, backward: &KvCacheSpec) -> Result<Self> {
        let tokens = forward_sequence(prompt);
        let blocker = TrigramBlocker::seeded(&tokens);
        Ok(Self {
            tokens,
            feeds: FeedPair::initialize(forward, backward)?,
            score: 0.0,
            blocker,
        })
    }

    /// Forward sequence, start symbol included.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    /// Tokens after the start symbol.
    pub fn content(&self) -> &[u32] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    pub fn content_len(&self) -> usize {
        content_len(&self.tokens)
    }

    /// Cumulative score.
    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn feeds(&self) -> &FeedPair {
        &self.feeds
    }

    pub fn blocker(&self) -> &TrigramBlocker {
        &self.blocker
    }

    /// Tokens this beam may not emit next.
    pub fn blocked(&self) -> &[u32] {
        self.blocker.blocked(&self.tokens)
    }

    /// Load the current sequence into both feeds for the next step.
    pub fn prepare(&mut self, with_position_ids: bool) {
        self.feeds.prepare(&self.tokens, with_position_ids);
    }

    /// Append a chosen token: record the trigram, add the score.
    pub fn push(&mut self, candidate: Candidate) {
        self.blocker.record(&self.tokens, candidate.token);
        self.tokens.push(candidate.token);
        self.score += candidate.score;
    }

    /// One child per candidate, each holding its own copy of the step's
    /// caches. The last child reuses this beam and takes the outputs
    /// themselves; the rest are deep clones.
    pub fn expand(self, candidates: &[Candidate], outputs: StepOutputs) -> Result<Vec<Beam>> {
        let Some((last, rest)) = candidates.split_last() else {
            self.dispose();
            return Ok(Vec::new());
        };

        let mut children = Vec::with_capacity(candidates.len());
        for &candidate in rest {
            let mut child = self.clone();
            child.feeds.update(outputs.clone())?;
            child.push(candidate);
            children.push(child);
        }

        let mut child = self;
        child.feeds.update(outputs)?;
        child.push(*last);
        children.push(child);
        Ok(children)
    }

    pub fn dispose(self) {
        self.feeds.dispose();
    }
}
