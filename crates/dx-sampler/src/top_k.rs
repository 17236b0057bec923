use rand::Rng;

use crate::candidate::{combine, ensure_finite, Candidate, Combine};
use crate::error::Result;
use crate::temperature::{softmax_with_temperature, GREEDY_TEMPERATURE};

/// Draws up to `k` distinct tokens scored by `min(forward, backward)`.
///
/// Sampling is without replacement: after each draw the chosen candidate
/// leaves the pool and the next draw is taken against the remaining weight.
/// For small `k` this is cheaper than a full Gumbel-top-k pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopKSampler {
    k: usize,
    temperature: f32,
}

impl TopKSampler {
    pub fn new(k: usize, temperature: f32) -> Self {
        Self { k, temperature }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Sample candidates for the final position.
    ///
    /// Blocked tokens score `-inf` and are never returned. Fewer than `k`
    /// candidates come back when the pool runs dry. Each candidate carries its
    /// combined logit as its score. Any non-finite input logit is an error,
    /// blocked or not.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        forward: &[f32],
        backward: &[f32],
        blocked: &[u32],
        rng: &mut R,
    ) -> Result<Vec<Candidate>> {
        let mut pool = combine(forward, backward, Combine::Min)?;
        ensure_finite(forward, backward)?;
        for candidate in pool.iter_mut() {
            if blocked.contains(&candidate.token) {
                candidate.score = f32::NEG_INFINITY;
            }
        }
        // Stable sort keeps index order among equal scores.
        pool.sort_by(|a, b| b.score.total_cmp(&a.score));

        if self.temperature < GREEDY_TEMPERATURE {
            return Ok(pool
                .into_iter()
                .filter(|c| !blocked.contains(&c.token))
                .take(self.k)
                .collect());
        }

        let scores: Vec<f32> = pool.iter().map(|c| c.score).collect();
        let mut weights = softmax_with_temperature(&scores, self.temperature);
        for (weight, candidate) in weights.iter_mut().zip(&pool) {
            if blocked.contains(&candidate.token) {
                *weight = 0.0;
            }
        }

        let mut picked = Vec::with_capacity(self.k);
        while picked.len() < self.k {
            let total: f32 = weights.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                break;
            }
            let target = rng.gen::<f32>() * total;

            let mut cumulative = 0.0;
            let mut chosen = None;
            for (i, &w) in weights.iter().enumerate() {
                cumulative += w;
                if cumulative > target {
                    chosen = Some(i);
                    break;
                }
            }
            // Rounding can leave the target just past the final sum.
            let chosen = match chosen.or_else(|| weights.iter().rposition(|&w| w > 0.0)) {
                Some(i) => i,
                None => break,
            };

            weights.remove(chosen);
            picked.push(pool.remove(chosen));
        }
        Ok(picked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SamplerError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn logits() -> (Vec<f32>, Vec<f32>) {
        let fwd = vec![0.0, 3.0, 1.0, 5.0, 2.0, 4.0];
        let bwd = vec![9.0, 3.5, 1.0, 6.0, 2.0, 4.5];
        (fwd, bwd)
    }

    #[test]
    fn test_zero_temperature_is_deterministic() {
        let (fwd, bwd) = logits();
        let sampler = TopKSampler::new(3, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = sampler.sample(&fwd, &bwd, &[], &mut rng).unwrap();
        let tokens: Vec<u32> = picked.iter().map(|c| c.token).collect();
        assert_eq!(tokens, vec![3, 5, 1]);
        assert_eq!(picked[0].score, 5.0);
    }

    #[test]
    fn test_zero_temperature_skips_blocked() {
        let (fwd, bwd) = logits();
        let sampler = TopKSampler::new(3, 0.0005);
        let mut rng = StdRng::seed_from_u64(1);
        let picked = sampler.sample(&fwd, &bwd, &[5], &mut rng).unwrap();
        let tokens: Vec<u32> = picked.iter().map(|c| c.token).collect();
        assert_eq!(tokens, vec![3, 1, 4]);
    }

    #[test]
    fn test_sampling_never_returns_blocked_or_duplicates() {
        let (fwd, bwd) = logits();
        let sampler = TopKSampler::new(4, 1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let picked = sampler.sample(&fwd, &bwd, &[3, 0], &mut rng).unwrap();
            assert_eq!(picked.len(), 4);
            let unique: HashSet<u32> = picked.iter().map(|c| c.token).collect();
            assert_eq!(unique.len(), picked.len());
            assert!(!unique.contains(&3));
            assert!(!unique.contains(&0));
        }
    }

    #[test]
    fn test_pool_exhaustion_returns_fewer() {
        let fwd = vec![1.0, 2.0, 3.0];
        let sampler = TopKSampler::new(5, 1.0);
        let mut rng = StdRng::seed_from_u64(3);
        let picked = sampler.sample(&fwd, &fwd, &[1], &mut rng).unwrap();
        let tokens: HashSet<u32> = picked.iter().map(|c| c.token).collect();
        assert_eq!(tokens, HashSet::from([0, 2]));
    }

    #[test]
    fn test_everything_blocked() {
        let fwd = vec![1.0, 2.0];
        let mut rng = StdRng::seed_from_u64(3);
        assert!(TopKSampler::new(2, 1.0)
            .sample(&fwd, &fwd, &[0, 1], &mut rng)
            .unwrap()
            .is_empty());
        assert!(TopKSampler::new(2, 0.0)
            .sample(&fwd, &fwd, &[0, 1], &mut rng)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_sharp_distribution_prefers_top() {
        let fwd = vec![0.0, 0.0, 50.0];
        let sampler = TopKSampler::new(1, 1.0);
        let mut rng = StdRng::seed_from_u64(11);
        let picked = sampler.sample(&fwd, &fwd, &[], &mut rng).unwrap();
        assert_eq!(picked[0].token, 2);
        assert_eq!(picked[0].score, 50.0);
    }

    #[test]
    fn test_non_finite_logits_rejected() {
        let (fwd, mut bwd) = logits();
        bwd[2] = f32::NAN;
        let mut rng = StdRng::seed_from_u64(5);
        for temperature in [0.0, 1.0] {
            let result = TopKSampler::new(3, temperature).sample(&fwd, &bwd, &[], &mut rng);
            assert!(matches!(result, Err(SamplerError::NonFinite { token: 2, .. })));
        }

        // A blocked token's logit is still checked.
        let fwd = vec![1.0, f32::NEG_INFINITY, 2.0];
        let result = TopKSampler::new(1, 1.0).sample(&fwd, &fwd, &[1], &mut rng);
        assert!(matches!(result, Err(SamplerError::NonFinite { token: 1, .. })));
    }

    #[test]
    fn test_equal_scores_draw_uniformly() {
        let fwd = vec![0.5; 4];
        let sampler = TopKSampler::new(1, 1.0);
        let mut counts = [0usize; 4];
        for seed in 0..4000 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = sampler.sample(&fwd, &fwd, &[], &mut rng).unwrap();
            counts[picked[0].token as usize] += 1;
        }
        for count in counts {
            assert!((800..1200).contains(&count), "counts {:?}", counts);
        }
    }

    #[test]
    fn test_lower_score_sometimes_drawn_first() {
        // softmax([0, 1]) gives token 0 about 27% of first draws.
        let fwd = vec![0.0, 1.0];
        let sampler = TopKSampler::new(2, 1.0);
        let mut rng = StdRng::seed_from_u64(9);
        let mut low_first = 0;
        for _ in 0..1000 {
            let picked = sampler.sample(&fwd, &fwd, &[], &mut rng).unwrap();
            assert_eq!(picked.len(), 2);
            if picked[0].token == 0 {
                low_first += 1;
            }
        }
        assert!((170..370).contains(&low_first), "low first {}", low_first);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let (fwd, bwd) = logits();
        let sampler = TopKSampler::new(3, 1.5);
        let a = sampler
            .sample(&fwd, &bwd, &[], &mut StdRng::seed_from_u64(42))
            .unwrap();
        let b = sampler
            .sample(&fwd, &bwd, &[], &mut StdRng::seed_from_u64(42))
            .unwrap();
        assert_eq!(a, b);
    }
}
