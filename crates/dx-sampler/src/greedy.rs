use crate::candidate::{combine, Candidate, Combine};
use crate::error::{Result, SamplerError};

/// Pick the token maximizing `forward + backward`, skipping `blocked`.
///
/// Ties go to the lowest index. Every summed value is checked, blocked or
/// not: a non-finite logit means the model or its caches are corrupt, and
/// generation must stop rather than continue on garbage.
pub fn argmax(forward: &[f32], backward: &[f32], blocked: &[u32]) -> Result<Candidate> {
    let mut best: Option<Candidate> = None;
    for candidate in combine(forward, backward, Combine::Sum)? {
        if !candidate.score.is_finite() {
            return Err(SamplerError::NonFinite {
                token: candidate.token,
                value: candidate.score,
            });
        }
        if blocked.contains(&candidate.token) {
            continue;
        }
        match best {
            Some(b) if b.score >= candidate.score => {}
            _ => best = Some(candidate),
        }
    }
    best.ok_or(SamplerError::NoCandidates)
}
