//! Intermediate and output file naming

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::voice::LanguageCode;

/// How intermediate and output files are keyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScratchPolicy {
    /// One base/output file per language. Concurrent requests for the same
    /// language overwrite each other's files; a rerun overwrites the last result.
    #[default]
    PerLanguage,
    /// Files keyed by request id, never shared between requests
    PerRequest,
}

/// Files written by one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchPaths {
    /// Base TTS audio before conversion
    pub base_audio: PathBuf,
    /// Converted output
    pub output_audio: PathBuf,
}

impl ScratchPaths {
    pub fn new(output_dir: &Path, language: LanguageCode, policy: ScratchPolicy, request_id: Uuid) -> Self {
        match policy {
            ScratchPolicy::PerLanguage => Self {
                base_audio: output_dir.join(format!("tmp_{}.wav", language)),
                output_audio: output_dir.join(format!("output_v2_{}.wav", language)),
            },
            ScratchPolicy::PerRequest => {
                let id = request_id.simple();
                Self {
                    base_audio: output_dir.join(format!("tmp_{}_{}.wav", language, id)),
                    output_audio: output_dir.join(format!("output_v2_{}_{}.wav", language, id)),
                }
            }
        }
    }
}
