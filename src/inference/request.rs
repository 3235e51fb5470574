//! Voice clone requests

use std::path::PathBuf;

/// One user invocation of the pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceCloneRequest {
    /// Text to speak
    pub text: String,
    /// UI language label; `None` selects the configured default
    pub language_label: Option<String>,
    /// Clip of the voice to clone
    pub reference_audio: Option<PathBuf>,
    /// Terms of service accepted
    pub consent_given: bool,
}

impl VoiceCloneRequest {
    pub fn new(
        text: impl Into<String>,
        language_label: impl Into<String>,
        reference_audio: impl Into<PathBuf>,
        consent_given: bool,
    ) -> Self {
        Self {
            text: text.into(),
            language_label: Some(language_label.into()),
            reference_audio: Some(reference_audio.into()),
            consent_given,
        }
    }

    pub fn builder() -> VoiceCloneRequestBuilder {
        VoiceCloneRequestBuilder::default()
    }
}

/// Fluent builder for [`VoiceCloneRequest`].
///
/// Performs no validation; that is the pipeline's first stage.
#[derive(Debug, Default)]
pub struct VoiceCloneRequestBuilder {
    request: VoiceCloneRequest,
}

impl VoiceCloneRequestBuilder {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.request.text = text.into();
        self
    }

    pub fn language(mut self, label: impl Into<String>) -> Self {
        self.request.language_label = Some(label.into());
        self
    }

    pub fn reference_audio(mut self, path: impl Into<PathBuf>) -> Self {
        self.request.reference_audio = Some(path.into());
        self
    }

    pub fn consent(mut self, given: bool) -> Self {
        self.request.consent_given = given;
        self
    }

    pub fn build(self) -> VoiceCloneRequest {
        self.request
    }
}
