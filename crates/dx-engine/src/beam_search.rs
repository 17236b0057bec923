use dx_sampler::TopKSampler;
use rand::Rng;

use crate::beam::Beam;
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::greedy::Outcome;
use crate::params::EngineConfig;
use crate::perplexity::perplexity;
use crate::runner::DualSession;
use crate::sequence::mirrored;
use crate::Progress;

/// Best beam of one round, ranked afterwards by perplexity.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalist {
    pub tokens: Vec<u32>,
    pub score: f32,
    pub perplexity: f32,
}

/// Beam search settings for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSettings {
    pub max_tokens: usize,
    pub beam_size: usize,
    pub temperature: f32,
}

/// Beam search with per-round finalists.
///
/// Every round expands each live beam into up to `beam_size + 1` sampled
/// children, keeps the `beam_size` best by cumulative score, and scores the
/// round's leader by forward perplexity. The lowest-perplexity finalist wins;
/// with no finalist at all the prompt comes back unchanged.
pub async fn run<R: Rng + ?Sized>(
    runner: &DualSession,
    config: &EngineConfig,
    prompt: &[u32],
    settings: BeamSettings,
    cancel: &CancelToken,
    rng: &mut R,
    mut progress: Progress<'_>,
) -> Result<(Outcome, Vec<Finalist>)> {
    let sampler = TopKSampler::new(settings.beam_size + 1, settings.temperature);
    let initial = Beam::new(prompt, &config.forward_cache, &config.backward_cache)?;
    let fallback = initial.tokens().to_vec();

    let mut beams = vec![initial];
    let mut finalists: Vec<Finalist> = Vec::new();
    let mut rounds = 0;
    let mut aborted = false;

    loop {
        if cancel.is_cancelled() {
            tracing::warn!(rounds, "beam search aborted");
            aborted = true;
            break;
        }

        let (live, finished): (Vec<Beam>, Vec<Beam>) = beams
            .into_iter()
            .partition(|beam| beam.content_len() < settings.max_tokens);
        finished.into_iter().for_each(Beam::dispose);
        beams = Vec::new();
        if live.is_empty() {
            break;
        }

        let mut children = Vec::new();
        for mut beam in live {
            beam.prepare(config.need_position_ids);
            let outputs = runner.step(beam.feeds()).await?;
            let (forward, backward) = outputs.last_logits()?;
            let candidates = sampler.sample(&forward, &backward, beam.blocked(), rng)?;
            if candidates.is_empty() {
                tracing::warn!(len = beam.tokens().len(), "beam has no unblocked candidates");
            }
            children.extend(beam.expand(&candidates, outputs)?);
        }

        if children.is_empty() {
            tracing::warn!(rounds, "no child beam survived");
            break;
        }

        children.sort_by(|a, b| b.score().total_cmp(&a.score()));
        if children.len() > settings.beam_size {
            children.drain(settings.beam_size..).for_each(Beam::dispose);
        }
        rounds += 1;

        let leader = &children[0];
        let ppl = perplexity(
            runner.forward(),
            &config.forward_cache,
            leader.content(),
            config.need_position_ids,
        )
        .await?;
        tracing::debug!(
            round = rounds,
            beams = children.len(),
            score = leader.score(),
            perplexity = ppl,
            "beam round"
        );
        finalists.push(Finalist {
            tokens: leader.tokens().to_vec(),
            score: leader.score(),
            perplexity: ppl,
        });

        if let Some(callback) = progress.as_mut() {
            callback(&mirrored(leader.tokens()));
        }
        beams = children;
    }
    beams.into_iter().for_each(Beam::dispose);

    finalists.sort_by(|a, b| a.perplexity.total_cmp(&b.perplexity));
    let forward = finalists
        .first()
        .map(|f| f.tokens.clone())
        .unwrap_or(fallback);

    Ok((
        Outcome {
            forward,
            steps: rounds,
            aborted,
        },
        finalists,
    ))
}
