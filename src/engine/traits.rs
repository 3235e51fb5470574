//! Contracts for the external model collaborators
//!
//! The neural models are opaque to this crate. The pipeline only needs the
//! operations below, so backends (native, FFI, subprocess) plug in by
//! implementing these traits. All methods are blocking and may take seconds;
//! callers run them on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{Device, Tensor};

use crate::voice::{LanguageCode, SpeakerId, SpeakerTable};

/// A loaded tone color conversion model
pub trait ToneColorConverter: Send + Sync {
    /// Model version; embeddings are only interchangeable within one version
    fn version(&self) -> &str;

    /// Device the model lives on
    fn device(&self) -> &Device;

    /// Re-voice `source_audio` from the `source` speaker to the `target` speaker,
    /// embedding `watermark` into the output written at `output`.
    fn convert(
        &self,
        source_audio: &Path,
        source: &Tensor,
        target: &Tensor,
        output: &Path,
        watermark: &str,
    ) -> anyhow::Result<PathBuf>;
}

/// Creates the converter from a checkpoint directory
pub trait ConverterLoader: Send + Sync {
    fn load(&self, checkpoint: &ConverterCheckpoint, device: &Device) -> anyhow::Result<Arc<dyn ToneColorConverter>>;
}

/// A loaded text-to-speech model bound to one language
pub trait TtsModel: Send + Sync {
    fn language(&self) -> LanguageCode;

    /// Speaker table in model-defined order
    fn speakers(&self) -> &SpeakerTable;

    /// Synthesize `text` with `speaker` and write the audio to `output`
    fn synthesize(
        &self,
        text: &str,
        speaker: SpeakerId,
        speed: f32,
        output: &Path,
    ) -> anyhow::Result<PathBuf>;
}

/// Creates TTS models per language
pub trait TtsModelLoader: Send + Sync {
    fn load(&self, language: LanguageCode, device: &Device) -> anyhow::Result<Arc<dyn TtsModel>>;
}

/// Extracts a speaker embedding from a reference clip using the converter
pub trait SpeakerEmbeddingExtractor: Send + Sync {
    fn extract(
        &self,
        audio: &Path,
        converter: &dyn ToneColorConverter,
        cache_dir: &Path,
        use_vad: bool,
    ) -> anyhow::Result<Tensor>;
}

/// Validated converter checkpoint layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterCheckpoint {
    /// Checkpoint directory
    pub dir: PathBuf,
    /// `config.json`
    pub config_path: PathBuf,
    /// `checkpoint.pth`
    pub weights_path: PathBuf,
    /// `_version_` from the config, when present
    pub version: Option<String>,
}

impl ConverterCheckpoint {
    pub const CONFIG_FILE: &'static str = "config.json";
    pub const WEIGHTS_FILE: &'static str = "checkpoint.pth";

    /// Check that the checkpoint files exist and read the model version
    pub fn locate(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(Self::CONFIG_FILE);
        let weights_path = dir.join(Self::WEIGHTS_FILE);

        if !config_path.is_file() {
            anyhow::bail!(
                "missing {} in {}. Did you download the V2 checkpoints?",
                Self::CONFIG_FILE,
                dir.display()
            );
        }
        if !weights_path.is_file() {
            anyhow::bail!(
                "missing {} in {}. Did you download the V2 checkpoints?",
                Self::WEIGHTS_FILE,
                dir.display()
            );
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", config_path.display(), e))?;
        let version = config
            .get("_version_")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self {
            dir: dir.to_path_buf(),
            config_path,
            weights_path,
            version,
        })
    }
}
