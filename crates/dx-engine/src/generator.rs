use std::time::{Duration, Instant};

use dx_model::{ExecutionProvider, InferenceSession, ModelSource, SessionBackend, SessionOptions};
use dx_tensor::DType;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::beam_search::{self, BeamSettings, Finalist};
use crate::cancel::CancelToken;
use crate::error::Result;
use crate::greedy;
use crate::params::{EngineConfig, GenerateParams, Strategy};
use crate::runner::{DualSession, FeedPair};
use crate::sequence::{content_len, mirrored};
use crate::Progress;

/// Lifecycle of the most recent generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    /// Feeds are fresh; nothing has run since load or reset.
    Init,
    /// A call is in progress.
    Stepping,
    /// The budget was exhausted or no beam survived.
    Done,
    /// The cancellation token was observed.
    Aborted,
    /// The call returned an error; feeds must be reset before reuse.
    Failed,
}

/// Settings for [`Generator::load`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub provider: ExecutionProvider,
    /// Whether the device supports f16 shaders. Ignored on wasm.
    pub has_fp16: bool,
    pub profiling: bool,
    pub need_position_ids: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            provider: ExecutionProvider::WebGpu,
            has_fp16: true,
            profiling: false,
            need_position_ids: true,
        }
    }
}

/// Result of a generation call with timing.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// `forward + reverse(forward)[1..]`.
    pub tokens: Vec<u32>,
    /// Final forward sequence, start symbol included.
    pub forward: Vec<u32>,
    /// Tokens added beyond the prompt.
    pub generated: usize,
    pub state: GenerationState,
    pub elapsed: Duration,
    /// Beam search finalists, best first. Empty for greedy decoding.
    pub finalists: Vec<Finalist>,
}

impl GenerationReport {
    pub fn tokens_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.generated as f64 / secs
        } else {
            0.0
        }
    }
}

/// Generation entry point: owns both sessions and the greedy feeds.
///
/// One call runs at a time (`&mut self`). Beam search builds per-beam feeds
/// of its own and drops them before returning.
pub struct Generator {
    runner: DualSession,
    config: EngineConfig,
    feeds: FeedPair,
    cancel: CancelToken,
    state: GenerationState,
}

impl Generator {
    pub fn new(runner: DualSession, config: EngineConfig) -> Result<Self> {
        let feeds = FeedPair::initialize(&config.forward_cache, &config.backward_cache)?;
        Ok(Self {
            runner,
            config,
            feeds,
            cancel: CancelToken::new(),
            state: GenerationState::Init,
        })
    }

    /// Create both sessions through `backend` and set up feeds.
    ///
    /// Cache tensors are f16 only when the provider can run them and the
    /// device reports f16 support.
    pub async fn load<B: SessionBackend + ?Sized>(
        backend: &B,
        forward: &ModelSource,
        backward: &ModelSource,
        options: LoadOptions,
    ) -> Result<Self> {
        let forward_session = create_session(backend, forward, &options).await?;
        let backward_session = create_session(backend, backward, &options).await?;

        let dtype = if options.provider.supports_f16() && options.has_fp16 {
            DType::F16
        } else {
            DType::F32
        };
        let mut config = EngineConfig::from_configs(&forward.config, &backward.config, dtype);
        config.need_position_ids = options.need_position_ids;
        config.profiling = options.profiling;

        tracing::info!(%dtype, "models ready");
        Self::new(DualSession::new(forward_session, backward_session), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// The greedy feeds, as left by the last call.
    pub fn feeds(&self) -> &FeedPair {
        &self.feeds
    }

    /// Ask the running (or next) call to stop at its next step boundary.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    /// A handle that can abort this generator's calls, e.g. from a progress
    /// callback. Each `generate` clears the flag when it starts.
    pub fn abort_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Dispose all cache tensors and return to empty feeds.
    pub fn reset(&mut self) -> Result<()> {
        self.feeds
            .reinitialize(&self.config.forward_cache, &self.config.backward_cache)?;
        self.state = GenerationState::Init;
        Ok(())
    }

    /// Generate from `prompt` and return `forward + reverse(forward)[1..]`.
    pub async fn generate(
        &mut self,
        prompt: &[u32],
        params: &GenerateParams,
        progress: Progress<'_>,
    ) -> Result<Vec<u32>> {
        Ok(self.generate_with_report(prompt, params, progress).await?.tokens)
    }

    /// [`Generator::generate`] with timing and state.
    pub async fn generate_with_report(
        &mut self,
        prompt: &[u32],
        params: &GenerateParams,
        progress: Progress<'_>,
    ) -> Result<GenerationReport> {
        self.cancel.reset();
        let cancel = self.cancel.clone();
        self.generate_with_cancel(prompt, params, &cancel, progress).await
    }

    /// Generate under an explicit cancellation token. The token is only read.
    pub async fn generate_with_cancel(
        &mut self,
        prompt: &[u32],
        params: &GenerateParams,
        cancel: &CancelToken,
        progress: Progress<'_>,
    ) -> Result<GenerationReport> {
        params.validate()?;
        self.reset()?;
        self.state = GenerationState::Stepping;
        tracing::info!(
            prompt_len = prompt.len(),
            max_tokens = params.max_tokens,
            strategy = ?params.strategy,
            "generation started"
        );

        let progress = if self.config.profiling { None } else { progress };
        let start = Instant::now();
        let result = match params.strategy {
            Strategy::Greedy => {
                greedy::run(
                    &self.runner,
                    &mut self.feeds,
                    prompt,
                    params.max_tokens,
                    self.config.need_position_ids,
                    cancel,
                    progress,
                )
                .await
                .map(|outcome| (outcome, Vec::new()))
            }
            Strategy::Beam {
                beam_size,
                temperature,
            } => {
                let mut rng = match params.seed {
                    Some(seed) => StdRng::seed_from_u64(seed),
                    None => StdRng::from_entropy(),
                };
                let settings = BeamSettings {
                    max_tokens: params.max_tokens,
                    beam_size,
                    temperature,
                };
                beam_search::run(
                    &self.runner,
                    &self.config,
                    prompt,
                    settings,
                    cancel,
                    &mut rng,
                    progress,
                )
                .await
            }
        };

        if self.config.profiling {
            self.runner.end_profiling();
        }
        let (outcome, finalists) = match result {
            Ok(done) => done,
            Err(err) => {
                tracing::warn!(error = %err, "generation failed");
                self.state = GenerationState::Failed;
                return Err(err);
            }
        };

        self.state = if outcome.aborted {
            GenerationState::Aborted
        } else {
            GenerationState::Done
        };
        let report = GenerationReport {
            tokens: mirrored(&outcome.forward),
            generated: content_len(&outcome.forward).saturating_sub(prompt.len()),
            forward: outcome.forward,
            state: self.state,
            elapsed: start.elapsed(),
            finalists,
        };
        tracing::info!(
            generated = report.generated,
            steps = outcome.steps,
            secs = report.elapsed.as_secs_f64(),
            tokens_per_sec = report.tokens_per_second(),
            "generation finished"
        );
        Ok(report)
    }
}

async fn create_session<B: SessionBackend + ?Sized>(
    backend: &B,
    source: &ModelSource,
    options: &LoadOptions,
) -> Result<Box<dyn InferenceSession>> {
    tracing::info!(
        model = %source.name,
        provider = %options.provider,
        size_mb = source.bytes.len() / 1024 / 1024,
        "loading model"
    );
    let session_options =
        SessionOptions::for_model(&source.config, options.provider, options.profiling);
    Ok(backend.create_session(&source.bytes, &session_options).await?)
}
