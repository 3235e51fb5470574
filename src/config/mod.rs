//! Configuration

mod voice_config;

pub use voice_config::{DeviceConfig, DeviceKind, LoggingConfig, VoiceCloneConfig};
