//! Model registry
//!
//! Owns the process-wide model instances: the tone color converter, loaded once
//! at startup, and one TTS model per language, loaded on first use and kept for
//! the lifetime of the registry.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use candle_core::Device;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{error, info, warn};

use crate::core::error::{CloneError, Result};
use crate::voice::LanguageCode;
use super::traits::{ConverterCheckpoint, ConverterLoader, ToneColorConverter, TtsModel, TtsModelLoader};

/// Converter lifecycle
enum ConverterState {
    NotLoaded,
    Ready(Arc<dyn ToneColorConverter>),
    /// Startup load failed; the reason is replayed to every request
    Failed(String),
}

/// Registry of loaded models
///
/// TTS models are cached per language. Each language has its own once-cell, so
/// concurrent first requests for the same language wait for a single load while
/// requests for other languages proceed. A failed load leaves the cell empty and
/// the next request tries again.
pub struct ModelRegistry {
    device: Device,
    converter_loader: Arc<dyn ConverterLoader>,
    tts_loader: Arc<dyn TtsModelLoader>,
    converter: RwLock<ConverterState>,
    tts_models: DashMap<LanguageCode, Arc<OnceCell<Arc<dyn TtsModel>>>>,
    tts_loads: AtomicU64,
}

impl ModelRegistry {
    /// Create an empty registry; nothing is loaded yet
    pub fn new(
        device: Device,
        converter_loader: Arc<dyn ConverterLoader>,
        tts_loader: Arc<dyn TtsModelLoader>,
    ) -> Self {
        Self {
            device,
            converter_loader,
            tts_loader,
            converter: RwLock::new(ConverterState::NotLoaded),
            tts_models: DashMap::new(),
            tts_loads: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Load the tone color converter from `checkpoint_dir`.
    ///
    /// Meant to be called once at startup. On failure the registry stays usable
    /// but degraded: `has_converter()` is false and every request fails with
    /// `ConverterUnavailable`. Later calls are ignored.
    pub fn load_converter(&self, checkpoint_dir: &Path) -> Result<()> {
        let mut state = self.converter.write().map_err(|_| {
            CloneError::internal("Failed to acquire write lock on converter", "ModelRegistry::load_converter")
        })?;

        if !matches!(*state, ConverterState::NotLoaded) {
            warn!("Tone color converter load already attempted, ignoring");
            return Ok(());
        }

        let loaded = ConverterCheckpoint::locate(checkpoint_dir)
            .and_then(|checkpoint| self.converter_loader.load(&checkpoint, &self.device));

        match loaded {
            Ok(converter) => {
                info!(
                    "Tone color converter {} loaded from {:?}",
                    converter.version(),
                    checkpoint_dir
                );
                *state = ConverterState::Ready(converter);
                Ok(())
            }
            Err(e) => {
                let reason = format!("failed to load from {}: {:#}", checkpoint_dir.display(), e);
                error!("Tone color converter {}", reason);
                *state = ConverterState::Failed(reason.clone());
                Err(CloneError::ConverterUnavailable { reason })
            }
        }
    }

    pub fn has_converter(&self) -> bool {
        self.converter
            .read()
            .map(|s| matches!(*s, ConverterState::Ready(_)))
            .unwrap_or(false)
    }

    /// The loaded converter, or `ConverterUnavailable`
    pub fn converter(&self) -> Result<Arc<dyn ToneColorConverter>> {
        let state = self.converter.read().map_err(|_| {
            CloneError::internal("Failed to acquire read lock on converter", "ModelRegistry::converter")
        })?;

        match &*state {
            ConverterState::Ready(converter) => Ok(Arc::clone(converter)),
            ConverterState::Failed(reason) => Err(CloneError::ConverterUnavailable {
                reason: reason.clone(),
            }),
            ConverterState::NotLoaded => Err(CloneError::ConverterUnavailable {
                reason: "converter was never loaded".to_string(),
            }),
        }
    }

    /// Cached TTS model for `language`, loading it on first use.
    ///
    /// Blocks while a load is in progress for the same language.
    pub fn get_or_load_tts(&self, language: LanguageCode) -> Result<Arc<dyn TtsModel>> {
        let cell = Arc::clone(
            self.tts_models
                .entry(language)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );

        let model = cell.get_or_try_init(|| {
            info!("Loading TTS model for {}...", language);
            self.tts_loads.fetch_add(1, Ordering::Relaxed);
            self.tts_loader
                .load(language, &self.device)
                .map_err(|e| CloneError::ModelLoad {
                    language,
                    message: format!("{:#}", e),
                })
        });

        match model {
            Ok(model) => Ok(Arc::clone(model)),
            Err(e) => {
                warn!("{}", e);
                Err(e)
            }
        }
    }

    /// Whether a TTS model for `language` is already cached
    pub fn is_tts_loaded(&self, language: LanguageCode) -> bool {
        self.tts_models
            .get(&language)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    /// Languages with a cached TTS model, sorted
    pub fn loaded_languages(&self) -> Vec<LanguageCode> {
        let mut languages: Vec<LanguageCode> = self
            .tts_models
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| *entry.key())
            .collect();
        languages.sort();
        languages
    }

    /// Get registry statistics
    pub fn stats(&self) -> RegistryStats {
        let converter_version = self.converter().ok().map(|c| c.version().to_string());
        RegistryStats {
            converter_loaded: converter_version.is_some(),
            converter_version,
            loaded_languages: self.loaded_languages(),
            tts_load_attempts: self.tts_loads.load(Ordering::Relaxed),
        }
    }
}

/// Registry statistics
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Converter is ready
    pub converter_loaded: bool,
    /// Version reported by the converter
    pub converter_version: Option<String>,
    /// Languages with a cached TTS model
    pub loaded_languages: Vec<LanguageCode>,
    /// TTS loads started, including failed ones
    pub tts_load_attempts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    use candle_core::Tensor;

    use crate::voice::{SpeakerId, SpeakerTable};

    struct NullConverter {
        device: Device,
    }

    impl ToneColorConverter for NullConverter {
        fn version(&self) -> &str {
            "v2"
        }

        fn device(&self) -> &Device {
            &self.device
        }

        fn convert(&self, _: &Path, _: &Tensor, _: &Tensor, output: &Path, _: &str) -> anyhow::Result<PathBuf> {
            Ok(output.to_path_buf())
        }
    }

    struct NullConverterLoader;

    impl ConverterLoader for NullConverterLoader {
        fn load(&self, _: &ConverterCheckpoint, device: &Device) -> anyhow::Result<Arc<dyn ToneColorConverter>> {
            Ok(Arc::new(NullConverter {
                device: device.clone(),
            }))
        }
    }

    struct StubModel {
        language: LanguageCode,
        speakers: SpeakerTable,
    }

    impl TtsModel for StubModel {
        fn language(&self) -> LanguageCode {
            self.language
        }

        fn speakers(&self) -> &SpeakerTable {
            &self.speakers
        }

        fn synthesize(&self, _: &str, _: SpeakerId, _: f32, output: &Path) -> anyhow::Result<PathBuf> {
            Ok(output.to_path_buf())
        }
    }

    #[derive(Default)]
    struct CountingLoader {
        loads: AtomicUsize,
        fail: bool,
    }

    impl TtsModelLoader for CountingLoader {
        fn load(&self, language: LanguageCode, _: &Device) -> anyhow::Result<Arc<dyn TtsModel>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("weights not found");
            }
            Ok(Arc::new(StubModel {
                language,
                speakers: [(language.as_str(), 0)].into_iter().collect(),
            }))
        }
    }

    fn registry(loader: Arc<CountingLoader>) -> ModelRegistry {
        ModelRegistry::new(Device::Cpu, Arc::new(NullConverterLoader), loader)
    }

    #[test]
    fn test_registry_new() {
        let registry = registry(Arc::new(CountingLoader::default()));
        let stats = registry.stats();
        assert!(!stats.converter_loaded);
        assert!(stats.loaded_languages.is_empty());
        assert!(!registry.has_converter());
    }

    #[test]
    fn test_tts_loaded_once_per_language() {
        let loader = Arc::new(CountingLoader::default());
        let registry = registry(Arc::clone(&loader));

        let first = registry.get_or_load_tts(LanguageCode::En).unwrap();
        let second = registry.get_or_load_tts(LanguageCode::En).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);

        registry.get_or_load_tts(LanguageCode::Fr).unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.loaded_languages(), vec![LanguageCode::En, LanguageCode::Fr]);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let loader = Arc::new(CountingLoader {
            fail: true,
            ..Default::default()
        });
        let registry = registry(Arc::clone(&loader));

        let err = registry.get_or_load_tts(LanguageCode::Zh).err().unwrap();
        assert!(matches!(err, CloneError::ModelLoad { language: LanguageCode::Zh, .. }));
        assert!(!registry.is_tts_loaded(LanguageCode::Zh));

        registry.get_or_load_tts(LanguageCode::Zh).err().unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
        assert_eq!(registry.stats().tts_load_attempts, 2);
    }

    #[test]
    fn test_missing_checkpoint_degrades() {
        let registry = registry(Arc::new(CountingLoader::default()));
        let dir = tempfile::tempdir().unwrap();

        let err = registry.load_converter(dir.path()).unwrap_err();
        assert!(matches!(err, CloneError::ConverterUnavailable { .. }));
        assert!(!registry.has_converter());
        assert!(matches!(
            registry.converter().err().unwrap(),
            CloneError::ConverterUnavailable { .. }
        ));
    }

    #[test]
    fn test_converter_loaded_from_checkpoint() {
        let registry = registry(Arc::new(CountingLoader::default()));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::write(dir.path().join("checkpoint.pth"), b"weights").unwrap();

        registry.load_converter(dir.path()).unwrap();
        assert!(registry.has_converter());
        assert_eq!(registry.stats().converter_version.as_deref(), Some("v2"));

        // second attempt is a no-op
        registry.load_converter(dir.path()).unwrap();
        assert!(registry.has_converter());
    }
}
