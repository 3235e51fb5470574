//! Embedding resolution
//!
//! Two embeddings feed every conversion:
//! - the target, extracted from the user's reference clip
//! - the source, precomputed for the TTS base speaker and read from the store
//!
//! Failures are reported differently on purpose. A bad reference clip is the
//! user's to fix (`EmbeddingExtraction`), a missing store file is an installation
//! problem (`MissingEmbeddingFile`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::Device;
use tracing::debug;

use crate::core::error::{CloneError, Result};
use crate::engine::traits::{SpeakerEmbeddingExtractor, ToneColorConverter};
use super::embedding::{Embedding, EmbeddingFormat};
use super::speaker_key::normalize;

/// Resolves source and target speaker embeddings
#[derive(Clone)]
pub struct EmbeddingResolver {
    extractor: Arc<dyn SpeakerEmbeddingExtractor>,
    store_dir: PathBuf,
    format: EmbeddingFormat,
    use_vad: bool,
}

impl EmbeddingResolver {
    pub fn new(
        extractor: Arc<dyn SpeakerEmbeddingExtractor>,
        store_dir: impl Into<PathBuf>,
        format: EmbeddingFormat,
    ) -> Self {
        Self {
            extractor,
            store_dir: store_dir.into(),
            format,
            use_vad: true,
        }
    }

    /// Enable/disable voice activity detection during extraction
    pub fn with_vad(mut self, use_vad: bool) -> Self {
        self.use_vad = use_vad;
        self
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn format(&self) -> EmbeddingFormat {
        self.format
    }

    /// Extract the target speaker embedding from a reference clip
    pub fn resolve_target(
        &self,
        reference: &Path,
        converter: &dyn ToneColorConverter,
        cache_dir: &Path,
    ) -> Result<Embedding> {
        let extraction_error = |message: String| CloneError::EmbeddingExtraction {
            path: reference.to_path_buf(),
            message,
        };

        if !reference.is_file() {
            return Err(extraction_error("reference audio file not found".to_string()));
        }

        let tensor = self
            .extractor
            .extract(reference, converter, cache_dir, self.use_vad)
            .map_err(|e| extraction_error(format!("{:#}", e)))?;

        debug!("Extracted target embedding {:?} from {:?}", tensor.dims(), reference);
        Ok(Embedding::target(tensor, reference, converter.version()))
    }

    /// Expected store path for a raw speaker key
    pub fn source_path(&self, speaker_key: &str) -> PathBuf {
        self.format.file_path(&self.store_dir, &normalize(speaker_key))
    }

    /// Load the precomputed embedding for a TTS base speaker
    pub fn resolve_source(
        &self,
        speaker_key: &str,
        device: &Device,
        model_version: &str,
    ) -> Result<Embedding> {
        let normalized = normalize(speaker_key);
        let path = self.format.file_path(&self.store_dir, &normalized);

        let missing = |message: String| CloneError::MissingEmbeddingFile {
            speaker_key: normalized.clone(),
            path: path.clone(),
            message,
        };

        if !path.is_file() {
            return Err(missing(format!(
                "please ensure '{}' exists",
                self.store_dir.display()
            )));
        }

        let tensor = self
            .format
            .read_tensor(&path, device)
            .map_err(|e| missing(format!("unreadable embedding file: {}", e)))?;

        debug!("Loaded source embedding '{}' from {:?}", normalized, path);
        Ok(Embedding::source(tensor, normalized, model_version))
    }

    /// Normalized speaker keys with an embedding file in the store, sorted
    pub fn list_store_speakers(&self) -> Result<Vec<String>> {
        list_store_speakers(&self.store_dir, self.format)
    }
}

/// Normalized speaker keys with a `format` embedding file in `store_dir`, sorted.
///
/// A missing store directory yields an empty list.
pub fn list_store_speakers(store_dir: &Path, format: EmbeddingFormat) -> Result<Vec<String>> {
    if !store_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(store_dir).map_err(|e| CloneError::Io {
        message: format!("Failed to read directory: {}", e),
        path: Some(store_dir.to_path_buf()),
    })?;

    let mut keys = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| CloneError::Io {
                message: format!("Failed to read entry: {}", e),
                path: Some(store_dir.to_path_buf()),
            })?
            .path();

        if path.extension().map(|e| e == format.extension()).unwrap_or(false) {
            if let Some(stem) = path.file_stem() {
                keys.push(stem.to_string_lossy().to_string());
            }
        }
    }
    keys.sort();
    Ok(keys)
}
