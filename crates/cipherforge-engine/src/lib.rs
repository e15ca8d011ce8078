#![forbid(unsafe_code)]
//! The Cipherforge build engine: per-target pipelines over the platform
//! build strategies, plus the aggregate build-all / clean surface.

pub mod collect;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod verify;

pub use error::EngineError;
pub use orchestrator::Orchestrator;
