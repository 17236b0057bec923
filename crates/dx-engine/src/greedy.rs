use dx_sampler::{argmax, TrigramBlocker};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::runner::{DualSession, FeedPair};
use crate::sequence::{content_len, forward_sequence, mirrored};
use crate::Progress;

/// The sequence a decoding loop ended with.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Forward sequence, start symbol included.
    pub forward: Vec<u32>,
    /// Number of completed steps.
    pub steps: usize,
    pub aborted: bool,
}

/// Greedy decoding over a single pair of feeds.
///
/// One blocker table serves the whole call. The feeds are expected to hold
/// empty caches on entry.
pub async fn run(
    runner: &DualSession,
    feeds: &mut FeedPair,
    prompt: &[u32],
    max_tokens: usize,
    need_position_ids: bool,
    cancel: &CancelToken,
    mut progress: Progress<'_>,
) -> Result<Outcome> {
    let mut tokens = forward_sequence(prompt);
    let mut blocker = TrigramBlocker::new();
    let mut steps = 0;

    while content_len(&tokens) < max_tokens {
        if cancel.is_cancelled() {
            tracing::warn!(steps, "greedy generation aborted");
            return Ok(Outcome {
                forward: tokens,
                steps,
                aborted: true,
            });
        }

        feeds.prepare(&tokens, need_position_ids);
        let outputs = runner.step(feeds).await?;
        let (forward, backward) = outputs.last_logits()?;

        let pick = argmax(&forward, &backward, blocker.blocked(&tokens))?;
        blocker.record(&tokens, pick.token);
        tokens.push(pick.token);
        feeds.update(outputs)?;
        steps += 1;
        tracing::debug!(step = steps, token = pick.token, score = pick.score, "greedy step");

        if let Some(callback) = progress.as_mut() {
            callback(&mirrored(&tokens));
        }
    }

    Ok(Outcome {
        forward: tokens,
        steps,
        aborted: false,
    })
}
