//! Core framework-level components
//!
//! - `error`: structured error handling with a failure-kind taxonomy

pub mod error;

pub use error::{CloneError, FailureKind, Result};
