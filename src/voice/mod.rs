//! Voice Module
//!
//! Everything that identifies a voice: the language table, base speaker keys,
//! speaker embeddings and how they are resolved.

pub mod embedding;
pub mod language;
pub mod resolver;
pub mod speaker_key;

pub use embedding::{Embedding, EmbeddingFormat, EmbeddingProvenance};
pub use language::{resolve_language, Language, LanguageCode};
pub use resolver::{list_store_speakers, EmbeddingResolver};
pub use speaker_key::{normalize, SpeakerId, SpeakerKey, SpeakerTable};
