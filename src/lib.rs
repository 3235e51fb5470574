//! # SDKWork-VoiceClone
//!
//! Voice cloning orchestration: speak any text in the timbre of a reference
//! speaker by synthesizing base audio with a multi-language TTS model and
//! re-voicing it with a tone color converter.
//!
//! The neural models are external. This crate owns everything around them:
//!
//! - **Model lifecycle**: the converter is loaded once at startup, TTS models
//!   lazily per language with at most one load per language
//! - **Speaker embeddings**: target from the reference clip, source from a
//!   precomputed store whose naming differs from the TTS speaker tables
//! - **Pipeline**: a staged run with a typed failure for every stage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sdkwork_voiceclone::{ModelRegistry, SynthesisPipeline, VoiceCloneConfig, VoiceCloneRequest};
//!
//! let config = VoiceCloneConfig::load("voiceclone.yaml")?;
//! config.ensure_output_dir()?;
//!
//! let registry = Arc::new(ModelRegistry::new(config.device.resolve()?, converter_loader, tts_loader));
//! // A failed load degrades the service instead of aborting
//! let _ = registry.load_converter(&config.converter_checkpoint_dir);
//!
//! let pipeline = SynthesisPipeline::from_config(&config, registry, extractor);
//! let request = VoiceCloneRequest::new("Hello world", "English (American)", "speaker.wav", true);
//! let output = pipeline.run(&request).await?;
//! println!("{}", output.output_audio_path.display());
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod inference;
pub mod voice;

// Core re-exports
pub use crate::core::error::{CloneError, FailureKind, Result};

// Configuration re-exports
pub use config::{DeviceConfig, DeviceKind, VoiceCloneConfig};

// Engine re-exports
pub use engine::{
    ConverterCheckpoint, ConverterLoader, ModelRegistry, RegistryStats,
    SpeakerEmbeddingExtractor, ToneColorConverter, TtsModel, TtsModelLoader,
};

// Pipeline re-exports
pub use inference::{
    PipelineResult, PipelineSettings, PipelineState, ScratchPolicy, SynthesisPipeline,
    VoiceCloneOutput, VoiceCloneRequest, WATERMARK_MESSAGE,
};

// Voice re-exports
pub use voice::{
    normalize, Embedding, EmbeddingFormat, EmbeddingProvenance, EmbeddingResolver,
    Language, LanguageCode, SpeakerKey, SpeakerTable,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
