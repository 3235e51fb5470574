//! Inference module: the voice cloning pipeline and its request types

mod pipeline;
mod request;
mod scratch;

pub use pipeline::{
    PipelineResult, PipelineSettings, PipelineState, SynthesisPipeline, VoiceCloneOutput,
    BASE_SPEED, WATERMARK_MESSAGE,
};
pub use request::{VoiceCloneRequest, VoiceCloneRequestBuilder};
pub use scratch::{ScratchPaths, ScratchPolicy};
