//! Model engine layer
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              SynthesisPipeline               │
//! ├──────────────────────────────────────────────┤
//! │                ModelRegistry                 │
//! │  ┌────────────────┐   ┌───────────────────┐  │
//! │  │ ToneColor      │   │ TtsModel per      │  │
//! │  │ Converter (1x) │   │ language (lazy)   │  │
//! │  └────────────────┘   └───────────────────┘  │
//! ├──────────────────────────────────────────────┤
//! │    External model backends (traits below)    │
//! └──────────────────────────────────────────────┘
//! ```

pub mod registry;
pub mod traits;

pub use registry::{ModelRegistry, RegistryStats};
pub use traits::{
    ConverterCheckpoint, ConverterLoader, SpeakerEmbeddingExtractor, ToneColorConverter,
    TtsModel, TtsModelLoader,
};
