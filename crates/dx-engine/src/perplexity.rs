//! Forward-model perplexity, used to rank beam-search finalists.

use dx_model::{Feed, InferenceSession, KvCacheSpec, ModelError};

use crate::error::{EngineError, Result};
use crate::sequence::forward_sequence;

/// Perplexity of `tokens` under the forward model.
///
/// `tokens` excludes the start symbol, which is prepended here. The whole
/// sequence goes through one forward pass on a fresh feed with empty caches.
pub async fn perplexity(
    session: &dyn InferenceSession,
    cache: &KvCacheSpec,
    tokens: &[u32],
    need_position_ids: bool,
) -> Result<f32> {
    let sequence = forward_sequence(tokens);
    if sequence.len() < 2 {
        return Err(EngineError::SequenceTooShort(sequence.len()));
    }

    let mut feed = Feed::initialize(cache)?;
    feed.set_sequence(&sequence, need_position_ids);
    let outputs = session.run(&feed).await?;
    feed.dispose();

    let (seq_len, vocab) = outputs.logits_dims()?;
    if seq_len != sequence.len() {
        return Err(ModelError::InvalidLogits(format!(
            "expected logits for {} positions, got {}",
            sequence.len(),
            seq_len
        ))
        .into());
    }
    let logits = outputs.all_logits()?;
    for layer in outputs.into_present() {
        layer.dispose();
    }

    perplexity_from_logits(&logits, vocab, &sequence)
}

/// `exp(mean(-log p(tokens[i + 1] | logits[i])))` over every position but
/// the last.
///
/// `logits` is row-major `[tokens.len(), vocab]`. Log-softmax subtracts each
/// row's maximum before exponentiating. A non-finite logit in any scored row
/// is an error, so the result is always finite.
pub fn perplexity_from_logits(logits: &[f32], vocab: usize, tokens: &[u32]) -> Result<f32> {
    if tokens.len() < 2 {
        return Err(EngineError::SequenceTooShort(tokens.len()));
    }
    if logits.len() < (tokens.len() - 1) * vocab {
        return Err(ModelError::InvalidLogits(format!(
            "{} logits cannot cover {} positions of {} tokens",
            logits.len(),
            tokens.len() - 1,
            vocab
        ))
        .into());
    }

    let mut nll = 0.0f32;
    for (pos, &target) in tokens.iter().enumerate().skip(1) {
        let row = &logits[(pos - 1) * vocab..pos * vocab];
        let target = target as usize;
        if target >= vocab {
            return Err(EngineError::TokenOutOfRange {
                token: target as u32,
                vocab,
            });
        }

        if let Some(bad) = row.iter().position(|x| !x.is_finite()) {
            return Err(ModelError::InvalidLogits(format!(
                "non-finite logit {} at position {}, token {}",
                row[bad],
                pos - 1,
                bad
            ))
            .into());
        }

        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let log_sum = row.iter().map(|&x| (x - max).exp()).sum::<f32>().ln() + max;
        nll += log_sum - row[target];
    }

    Ok((nll / (tokens.len() - 1) as f32).exp())
}
