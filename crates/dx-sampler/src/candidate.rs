use crate::error::{Result, SamplerError};

/// A token paired with the score it was selected with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub token: u32,
    pub score: f32,
}

/// How forward and backward logits merge into one score per token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combine {
    /// `forward + backward`; used by greedy decoding.
    Sum,
    /// `min(forward, backward)`; a token scores only as well as the
    /// direction that likes it least. Used by top-k sampling. NaN in either
    /// direction yields NaN.
    Min,
}

impl Combine {
    pub fn apply(&self, forward: f32, backward: f32) -> f32 {
        match self {
            Combine::Sum => forward + backward,
            Combine::Min if forward.is_nan() || backward.is_nan() => f32::NAN,
            Combine::Min => forward.min(backward),
        }
    }
}

/// Merge last-position logits of both directions, one candidate per
/// vocabulary index in index order.
pub fn combine(forward: &[f32], backward: &[f32], policy: Combine) -> Result<Vec<Candidate>> {
    if forward.len() != backward.len() {
        return Err(SamplerError::LengthMismatch {
            forward: forward.len(),
            backward: backward.len(),
        });
    }
    Ok(forward
        .iter()
        .zip(backward)
        .enumerate()
        .map(|(i, (&f, &b))| Candidate {
            token: i as u32,
            score: policy.apply(f, b),
        })
        .collect())
}

/// Fail on the first non-finite logit in either direction.
///
/// Checks the raw rows rather than a combined score, since `min` can hide a
/// corrupt value behind a finite one.
pub fn ensure_finite(forward: &[f32], backward: &[f32]) -> Result<()> {
    for (i, (&f, &b)) in forward.iter().zip(backward).enumerate() {
        for value in [f, b] {
            if !value.is_finite() {
                return Err(SamplerError::NonFinite {
                    token: i as u32,
                    value,
                });
            }
        }
    }
    Ok(())
}
