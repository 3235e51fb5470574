//! Voice cloning pipeline
//!
//! Drives one request through the stages
//!
//! ```text
//! Validating -> ResolvingModels ─┐
//!            -> ExtractingTargetEmbedding ─┴> Synthesizing
//!            -> ResolvingSourceEmbedding -> Converting -> Done
//! ```
//!
//! Any stage can end the run in `Failed(kind)`, which is appended to the
//! visited states and reported with the failure. Nothing is retried and
//! intermediate files are left in place on failure. Every model call is blocking
//! and runs on the tokio blocking pool so request intake is never stalled.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::VoiceCloneConfig;
use crate::core::error::{CloneError, FailureKind, Result};
use crate::engine::{ModelRegistry, SpeakerEmbeddingExtractor, ToneColorConverter};
use crate::voice::{resolve_language, EmbeddingResolver, Language, SpeakerKey};
use super::request::VoiceCloneRequest;
use super::scratch::{ScratchPaths, ScratchPolicy};

/// Provenance watermark embedded into every converted output
pub const WATERMARK_MESSAGE: &str = "@MyShell";

/// Speaking rate used for base audio
pub const BASE_SPEED: f32 = 1.0;

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Validating,
    ResolvingModels,
    ExtractingTargetEmbedding,
    Synthesizing,
    ResolvingSourceEmbedding,
    Converting,
    Done,
    Failed(FailureKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Validating => write!(f, "validating"),
            PipelineState::ResolvingModels => write!(f, "resolving models"),
            PipelineState::ExtractingTargetEmbedding => write!(f, "extracting target embedding"),
            PipelineState::Synthesizing => write!(f, "synthesizing"),
            PipelineState::ResolvingSourceEmbedding => write!(f, "resolving source embedding"),
            PipelineState::Converting => write!(f, "converting"),
            PipelineState::Done => write!(f, "done"),
            PipelineState::Failed(kind) => write!(f, "failed ({})", kind),
        }
    }
}

/// Outcome handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
    Success { output_audio_path: PathBuf },
    Failure {
        kind: FailureKind,
        message: String,
        /// States visited, ending in `Failed(kind)`
        states: Vec<PipelineState>,
    },
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResult::Success { .. })
    }

    pub fn output_audio_path(&self) -> Option<&Path> {
        match self {
            PipelineResult::Success { output_audio_path } => Some(output_audio_path),
            PipelineResult::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PipelineResult::Success { .. } => None,
            PipelineResult::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Last stage entered before the run failed
    pub fn failed_stage(&self) -> Option<PipelineState> {
        match self {
            PipelineResult::Success { .. } => None,
            PipelineResult::Failure { states, .. } => states
                .iter()
                .rev()
                .find(|state| !state.is_terminal())
                .copied(),
        }
    }

    fn from_outcome(outcome: Result<VoiceCloneOutput>, states: Vec<PipelineState>) -> Self {
        match outcome {
            Ok(output) => PipelineResult::Success {
                output_audio_path: output.output_audio_path,
            },
            Err(e) => PipelineResult::Failure {
                kind: e.kind(),
                message: e.user_message(),
                states,
            },
        }
    }
}

/// Successful run details
#[derive(Debug, Clone)]
pub struct VoiceCloneOutput {
    pub request_id: Uuid,
    /// Converted audio
    pub output_audio_path: PathBuf,
    /// Base TTS audio the conversion started from
    pub base_audio_path: PathBuf,
    pub language: Language,
    /// Base speaker as named by the TTS model
    pub base_speaker: SpeakerKey,
    /// States visited, ending in `Done`
    pub states: Vec<PipelineState>,
    pub elapsed: Duration,
}

/// Pipeline settings derived from the service configuration
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub output_dir: PathBuf,
    pub extraction_cache_dir: PathBuf,
    pub scratch_policy: ScratchPolicy,
    pub default_language: Language,
    pub strict_languages: bool,
    pub stage_timeout: Option<Duration>,
}

impl From<&VoiceCloneConfig> for PipelineSettings {
    fn from(config: &VoiceCloneConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            extraction_cache_dir: config.extraction_cache_dir.clone(),
            scratch_policy: config.scratch_policy,
            default_language: config.default_language,
            strict_languages: config.strict_languages,
            stage_timeout: config.stage_timeout(),
        }
    }
}

/// Validated request, ready for the model stages
struct ValidatedRequest {
    text: String,
    language: Language,
    reference: PathBuf,
    converter: Arc<dyn ToneColorConverter>,
}

/// Voice cloning orchestrator
///
/// Cheap to clone; clones share the registry and resolver.
#[derive(Clone)]
pub struct SynthesisPipeline {
    registry: Arc<ModelRegistry>,
    resolver: Arc<EmbeddingResolver>,
    settings: Arc<PipelineSettings>,
}

impl SynthesisPipeline {
    pub fn new(registry: Arc<ModelRegistry>, resolver: EmbeddingResolver, settings: PipelineSettings) -> Self {
        Self {
            registry,
            resolver: Arc::new(resolver),
            settings: Arc::new(settings),
        }
    }

    /// Build a pipeline with the store and scratch settings from `config`
    pub fn from_config(
        config: &VoiceCloneConfig,
        registry: Arc<ModelRegistry>,
        extractor: Arc<dyn SpeakerEmbeddingExtractor>,
    ) -> Self {
        let resolver = EmbeddingResolver::new(
            extractor,
            config.embedding_store_dir.clone(),
            config.embedding_format,
        )
        .with_vad(config.use_vad);
        Self::new(registry, resolver, PipelineSettings::from(config))
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run a request and fold the outcome into a [`PipelineResult`]
    pub async fn execute(&self, request: &VoiceCloneRequest) -> PipelineResult {
        let (outcome, states) = self.run_traced(request).await;
        PipelineResult::from_outcome(outcome, states)
    }

    /// Run a request through every stage
    pub async fn run(&self, request: &VoiceCloneRequest) -> Result<VoiceCloneOutput> {
        self.run_traced(request).await.0
    }

    /// Run a request, returning the outcome with the states visited
    async fn run_traced(&self, request: &VoiceCloneRequest) -> (Result<VoiceCloneOutput>, Vec<PipelineState>) {
        let request_id = Uuid::new_v4();
        let span = info_span!("voice_clone", request_id = %request_id);

        async move {
            let started = Instant::now();
            let mut states = Vec::new();

            match self.run_stages(request, request_id, &mut states).await {
                Ok((paths, language, base_speaker)) => {
                    enter(&mut states, PipelineState::Done);
                    let elapsed = started.elapsed();
                    info!("Voice clone finished in {:.2}s: {:?}", elapsed.as_secs_f32(), paths.output_audio);
                    let output = VoiceCloneOutput {
                        request_id,
                        output_audio_path: paths.output_audio,
                        base_audio_path: paths.base_audio,
                        language,
                        base_speaker,
                        states: states.clone(),
                        elapsed,
                    };
                    (Ok(output), states)
                }
                Err(e) => {
                    let stage = states.last().copied().unwrap_or(PipelineState::Validating);
                    enter(&mut states, PipelineState::Failed(e.kind()));
                    warn!(path = %state_path(&states), "Voice clone failed while {}: {}", stage, e);
                    (Err(e), states)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_stages(
        &self,
        request: &VoiceCloneRequest,
        request_id: Uuid,
        states: &mut Vec<PipelineState>,
    ) -> Result<(ScratchPaths, Language, SpeakerKey)> {
        enter(states, PipelineState::Validating);
        let validated = self.validate(request)?;
        let code = validated.language.code();
        let converter = validated.converter;

        // TTS model and target embedding are independent
        enter(states, PipelineState::ResolvingModels);
        enter(states, PipelineState::ExtractingTargetEmbedding);
        let load_model = {
            let registry = Arc::clone(&self.registry);
            self.blocking(PipelineState::ResolvingModels, move || registry.get_or_load_tts(code))
        };
        let extract_target = {
            let resolver = Arc::clone(&self.resolver);
            let converter = Arc::clone(&converter);
            let reference = validated.reference.clone();
            let cache_dir = self.settings.extraction_cache_dir.clone();
            self.blocking(PipelineState::ExtractingTargetEmbedding, move || {
                resolver.resolve_target(&reference, converter.as_ref(), &cache_dir)
            })
        };
        let (model, target) = tokio::join!(load_model, extract_target);
        let model = model?;
        let target = target?;

        enter(states, PipelineState::Synthesizing);
        let (speaker_key, speaker_id) = model
            .speakers()
            .first()
            .map(|(key, id)| (key.clone(), id))
            .ok_or_else(|| CloneError::Synthesis {
                language: code,
                message: "model exposes no speakers".to_string(),
            })?;
        debug!("Base speaker {} (id {})", speaker_key, speaker_id);

        let paths = ScratchPaths::new(&self.settings.output_dir, code, self.settings.scratch_policy, request_id);
        let base_audio = {
            let model = Arc::clone(&model);
            let text = validated.text;
            let output = paths.base_audio.clone();
            self.blocking(PipelineState::Synthesizing, move || {
                model
                    .synthesize(&text, speaker_id, BASE_SPEED, &output)
                    .map_err(|e| CloneError::Synthesis {
                        language: code,
                        message: format!("{:#}", e),
                    })
            })
            .await?
        };

        enter(states, PipelineState::ResolvingSourceEmbedding);
        let source = {
            let resolver = Arc::clone(&self.resolver);
            let key = speaker_key.as_str().to_string();
            let device = converter.device().clone();
            let version = converter.version().to_string();
            self.blocking(PipelineState::ResolvingSourceEmbedding, move || {
                resolver.resolve_source(&key, &device, &version)
            })
            .await?
        };

        if !source.is_compatible_with(&target) {
            return Err(CloneError::Conversion {
                message: format!(
                    "source embedding {:?} ({}) does not match target embedding {:?} ({})",
                    source.dims(),
                    source.model_version(),
                    target.dims(),
                    target.model_version()
                ),
            });
        }

        enter(states, PipelineState::Converting);
        let output_audio = {
            let output = paths.output_audio.clone();
            self.blocking(PipelineState::Converting, move || {
                converter
                    .convert(&base_audio, source.tensor(), target.tensor(), &output, WATERMARK_MESSAGE)
                    .map_err(|e| CloneError::Conversion {
                        message: format!("{:#}", e),
                    })
            })
            .await?
        };

        Ok((
            ScratchPaths {
                base_audio: paths.base_audio,
                output_audio,
            },
            validated.language,
            speaker_key,
        ))
    }

    /// Request-shape and service-state checks; no side effects
    fn validate(&self, request: &VoiceCloneRequest) -> Result<ValidatedRequest> {
        if !request.consent_given {
            return Err(CloneError::ConsentMissing);
        }

        let converter = self.registry.converter()?;

        let text = request.text.trim();
        if text.is_empty() {
            return Err(CloneError::EmptyText);
        }

        let reference = match &request.reference_audio {
            Some(path) if !path.as_os_str().is_empty() => path.clone(),
            _ => return Err(CloneError::NoReferenceAudio),
        };

        let language = resolve_language(
            request.language_label.as_deref(),
            self.settings.default_language,
            self.settings.strict_languages,
        )?;

        Ok(ValidatedRequest {
            text: request.text.clone(),
            language,
            reference,
            converter,
        })
    }

    /// Run a blocking model call off the async workers, honoring the stage timeout
    async fn blocking<T, F>(&self, stage: PipelineState, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = tokio::task::spawn_blocking(f);
        match self.settings.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined?,
                Err(_) => Err(CloneError::Timeout {
                    stage: stage.to_string(),
                    duration_ms: limit.as_millis() as u64,
                }),
            },
            None => handle.await?,
        }
    }
}

fn enter(states: &mut Vec<PipelineState>, state: PipelineState) {
    debug!("State {}", state);
    states.push(state);
}

fn state_path(states: &[PipelineState]) -> String {
    states
        .iter()
        .map(PipelineState::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
