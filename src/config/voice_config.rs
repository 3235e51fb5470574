//! Service configuration
//!
//! Loaded once at startup from YAML. Every field has a default matching the
//! standard OpenVoice V2 checkout layout, so an empty file is a valid config.

use std::path::{Path, PathBuf};
use std::time::Duration;

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::core::error::{CloneError, Result};
use crate::inference::ScratchPolicy;
use crate::voice::{EmbeddingFormat, Language};

/// Voice cloning service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceCloneConfig {
    /// Tone color converter checkpoint directory (`config.json` + `checkpoint.pth`)
    #[serde(default = "default_converter_dir")]
    pub converter_checkpoint_dir: PathBuf,

    /// Precomputed base speaker embeddings
    #[serde(default = "default_embedding_store_dir")]
    pub embedding_store_dir: PathBuf,

    /// File format of the embedding store
    #[serde(default)]
    pub embedding_format: EmbeddingFormat,

    /// Generated audio directory, created at startup
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Scratch directory for the embedding extractor
    #[serde(default = "default_extraction_cache_dir")]
    pub extraction_cache_dir: PathBuf,

    /// Compute device
    #[serde(default)]
    pub device: DeviceConfig,

    /// Voice activity detection during target extraction
    #[serde(default = "default_true")]
    pub use_vad: bool,

    /// Naming of intermediate and output files
    #[serde(default)]
    pub scratch_policy: ScratchPolicy,

    /// Language used when a request names none
    #[serde(default)]
    pub default_language: Language,

    /// Reject unknown language labels instead of falling back to the default
    #[serde(default)]
    pub strict_languages: bool,

    /// Per-stage timeout for blocking model calls (unset = wait forever)
    #[serde(default)]
    pub stage_timeout_secs: Option<u64>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compute device selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub kind: DeviceKind,

    /// Accelerator ordinal
    #[serde(default)]
    pub index: usize,
}

/// Device kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Accelerator if available, else CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            kind: DeviceKind::Auto,
            index: 0,
        }
    }
}

impl DeviceConfig {
    pub fn cpu() -> Self {
        Self {
            kind: DeviceKind::Cpu,
            index: 0,
        }
    }

    /// Resolve to a candle device
    pub fn resolve(&self) -> Result<Device> {
        let device_error = |e: candle_core::Error| CloneError::Config {
            message: format!("Device {:?}:{} unavailable: {}", self.kind, self.index, e),
            path: None,
        };

        match self.kind {
            DeviceKind::Cpu => Ok(Device::Cpu),
            DeviceKind::Cuda => Device::new_cuda(self.index).map_err(device_error),
            DeviceKind::Metal => Device::new_metal(self.index).map_err(device_error),
            DeviceKind::Auto => {
                let device = Device::cuda_if_available(self.index).map_err(device_error)?;
                if device.is_cpu() {
                    Device::metal_if_available(self.index).map_err(device_error)
                } else {
                    Ok(device)
                }
            }
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter: a level (trace, debug, info, warn, error) or `tracing` env-filter directives
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Default values
fn default_converter_dir() -> PathBuf {
    PathBuf::from("checkpoints_v2/converter")
}

fn default_embedding_store_dir() -> PathBuf {
    PathBuf::from("checkpoints_v2/base_speakers/ses")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs_v2")
}

fn default_extraction_cache_dir() -> PathBuf {
    PathBuf::from("processed")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for VoiceCloneConfig {
    fn default() -> Self {
        Self {
            converter_checkpoint_dir: default_converter_dir(),
            embedding_store_dir: default_embedding_store_dir(),
            embedding_format: EmbeddingFormat::default(),
            output_dir: default_output_dir(),
            extraction_cache_dir: default_extraction_cache_dir(),
            device: DeviceConfig::default(),
            use_vad: true,
            scratch_policy: ScratchPolicy::default(),
            default_language: Language::default(),
            strict_languages: false,
            stage_timeout_secs: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl VoiceCloneConfig {
    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CloneError::Config {
            message: format!("Failed to read config file: {}", e),
            path: Some(path.to_path_buf()),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| CloneError::Config {
            message: format!("Failed to parse config YAML: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self).map_err(|e| CloneError::Config {
            message: format!("Failed to serialize config: {}", e),
            path: Some(path.as_ref().to_path_buf()),
        })?;
        std::fs::write(path.as_ref(), content).map_err(|e| CloneError::Io {
            message: e.to_string(),
            path: Some(path.as_ref().to_path_buf()),
        })
    }

    /// Check field values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(CloneError::Config {
                message: "output_dir must not be empty".to_string(),
                path: None,
            });
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(CloneError::Config {
                message: "stage_timeout_secs must be greater than zero".to_string(),
                path: None,
            });
        }
        Ok(())
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }

    /// Create the output directory if it does not exist
    pub fn ensure_output_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).map_err(|e| CloneError::Io {
            message: format!("Failed to create output directory: {}", e),
            path: Some(self.output_dir.clone()),
        })
    }
}
