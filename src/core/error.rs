//! Structured error handling for the voice cloning pipeline
//!
//! Every failure the pipeline can surface is a `CloneError` variant. Each variant
//! maps to exactly one `FailureKind`, which is what the presentation layer
//! switches on to pick a user-facing message.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::voice::LanguageCode;

/// Result type alias with CloneError
pub type Result<T> = std::result::Result<T, CloneError>;

/// Main error type for the voice cloning pipeline
#[derive(Error, Debug, Clone)]
pub enum CloneError {
    /// Tone color converter failed to load at startup
    #[error("Tone color converter is not loaded: {reason}")]
    ConverterUnavailable { reason: String },

    /// Terms of service not accepted
    #[error("Consent flag not set")]
    ConsentMissing,

    /// Input text blank after trimming
    #[error("Input text is empty")]
    EmptyText,

    /// No reference audio supplied
    #[error("No reference audio provided")]
    NoReferenceAudio,

    /// Language label outside the supported table (strict mode only)
    #[error("Unsupported language '{label}'")]
    UnknownLanguage { label: String },

    /// Lazy TTS model load failed
    #[error("Failed to load TTS model for {language}: {message}")]
    ModelLoad {
        language: LanguageCode,
        message: String,
    },

    /// Target speaker embedding could not be extracted from the reference clip
    #[error("Error extracting tone color from {}: {message}", path.display())]
    EmbeddingExtraction { path: PathBuf, message: String },

    /// Precomputed source speaker embedding is not installed or unreadable
    #[error("Could not find source speaker embedding for '{speaker_key}' at {}: {message}", path.display())]
    MissingEmbeddingFile {
        speaker_key: String,
        path: PathBuf,
        message: String,
    },

    /// Base audio synthesis failed
    #[error("Speech synthesis failed for {language}: {message}")]
    Synthesis {
        language: LanguageCode,
        message: String,
    },

    /// Tone color conversion failed
    #[error("Tone color conversion failed: {message}")]
    Conversion { message: String },

    /// A blocking stage exceeded the configured stage timeout
    #[error("Operation timeout in {stage}: exceeded {duration_ms}ms")]
    Timeout { stage: String, duration_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        path: Option<PathBuf>,
    },

    /// I/O errors
    #[error("I/O error: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// Internal/bug errors
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        location: Option<String>,
    },
}

/// Distinguishable failure categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ConverterUnavailable,
    ConsentMissing,
    EmptyText,
    NoReferenceAudio,
    UnknownLanguage,
    ModelLoadError,
    EmbeddingExtractionError,
    MissingEmbeddingFile,
    SynthesisError,
    ConversionError,
    Timeout,
    Config,
    Io,
    Internal,
}

impl FailureKind {
    /// Whether the failure was caused by the request shape rather than the models
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            FailureKind::ConsentMissing
                | FailureKind::EmptyText
                | FailureKind::NoReferenceAudio
                | FailureKind::UnknownLanguage
        )
    }

    /// Whether the operator (not the user) has to act, e.g. install missing assets
    pub fn is_installation_error(&self) -> bool {
        matches!(
            self,
            FailureKind::ConverterUnavailable
                | FailureKind::MissingEmbeddingFile
                | FailureKind::Config
        )
    }

    /// Generic warning text for this kind
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::ConverterUnavailable => {
                "Tone Color Converter model is not loaded. Please check console for errors regarding missing checkpoints."
            }
            FailureKind::ConsentMissing => "Please set the 'Agree' checkbox to proceed.",
            FailureKind::EmptyText => "Please enter text to synthesize.",
            FailureKind::NoReferenceAudio => "Please provide a reference audio file.",
            FailureKind::UnknownLanguage => "Please select one of the supported languages.",
            FailureKind::ModelLoadError => "Failed to load the text-to-speech model for this language.",
            FailureKind::EmbeddingExtractionError => {
                "Could not extract a voice from the reference audio. Please try a different clip."
            }
            FailureKind::MissingEmbeddingFile => {
                "Base speaker embeddings are missing. Please ensure 'checkpoints_v2/base_speakers/ses' exists."
            }
            FailureKind::SynthesisError => "Speech synthesis failed.",
            FailureKind::ConversionError => "Tone color conversion failed.",
            FailureKind::Timeout => "The request took too long and was abandoned.",
            FailureKind::Config => "The service is misconfigured.",
            FailureKind::Io => "A file could not be read or written.",
            FailureKind::Internal => "An internal error occurred.",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::ConverterUnavailable => "ConverterUnavailable",
            FailureKind::ConsentMissing => "ConsentMissing",
            FailureKind::EmptyText => "EmptyText",
            FailureKind::NoReferenceAudio => "NoReferenceAudio",
            FailureKind::UnknownLanguage => "UnknownLanguage",
            FailureKind::ModelLoadError => "ModelLoadError",
            FailureKind::EmbeddingExtractionError => "EmbeddingExtractionError",
            FailureKind::MissingEmbeddingFile => "MissingEmbeddingFile",
            FailureKind::SynthesisError => "SynthesisError",
            FailureKind::ConversionError => "ConversionError",
            FailureKind::Timeout => "Timeout",
            FailureKind::Config => "Config",
            FailureKind::Io => "Io",
            FailureKind::Internal => "Internal",
        };
        f.write_str(name)
    }
}

impl CloneError {
    /// Failure category of this error
    pub fn kind(&self) -> FailureKind {
        match self {
            CloneError::ConverterUnavailable { .. } => FailureKind::ConverterUnavailable,
            CloneError::ConsentMissing => FailureKind::ConsentMissing,
            CloneError::EmptyText => FailureKind::EmptyText,
            CloneError::NoReferenceAudio => FailureKind::NoReferenceAudio,
            CloneError::UnknownLanguage { .. } => FailureKind::UnknownLanguage,
            CloneError::ModelLoad { .. } => FailureKind::ModelLoadError,
            CloneError::EmbeddingExtraction { .. } => FailureKind::EmbeddingExtractionError,
            CloneError::MissingEmbeddingFile { .. } => FailureKind::MissingEmbeddingFile,
            CloneError::Synthesis { .. } => FailureKind::SynthesisError,
            CloneError::Conversion { .. } => FailureKind::ConversionError,
            CloneError::Timeout { .. } => FailureKind::Timeout,
            CloneError::Config { .. } => FailureKind::Config,
            CloneError::Io { .. } => FailureKind::Io,
            CloneError::Internal { .. } => FailureKind::Internal,
        }
    }

    /// Warning text for the presentation layer.
    ///
    /// Request-shape failures get the fixed prompt for their kind; model and
    /// installation failures pass the underlying message through.
    pub fn user_message(&self) -> String {
        let kind = self.kind();
        if kind.is_request_error() {
            kind.user_message().to_string()
        } else if let CloneError::ConverterUnavailable { .. } = self {
            kind.user_message().to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn internal(message: impl Into<String>, location: &str) -> Self {
        CloneError::Internal {
            message: message.into(),
            location: Some(location.to_string()),
        }
    }
}

/// Convert from std::io::Error
impl From<std::io::Error> for CloneError {
    fn from(err: std::io::Error) -> Self {
        CloneError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

/// Convert from candle_core::Error
impl From<candle_core::Error> for CloneError {
    fn from(err: candle_core::Error) -> Self {
        CloneError::Internal {
            message: format!("Tensor operation failed: {}", err),
            location: None,
        }
    }
}

/// Convert from tokio::task::JoinError (a blocking stage panicked or was cancelled)
impl From<tokio::task::JoinError> for CloneError {
    fn from(err: tokio::task::JoinError) -> Self {
        CloneError::Internal {
            message: format!("Blocking task failed: {}", err),
            location: None,
        }
    }
}
