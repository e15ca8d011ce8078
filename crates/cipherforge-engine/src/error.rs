//! Error types for cipherforge-engine.
//!
//! Host and configuration errors are fatal before any target runs; the
//! precondition, acquisition, and build errors are fatal only for the
//! target whose pipeline raised them.

/// Errors produced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The host platform cannot run builds at all.
    #[error("{0}")]
    Host(#[from] cipherforge_targets::TargetError),

    /// The manifest is invalid (bad target name, forced option supplied,
    /// required option missing).
    #[error("{0}")]
    Config(#[from] cipherforge_config::ConfigError),

    /// A required toolchain component is missing for one target.
    #[error("precondition failed for {component}: {message}")]
    Precondition { component: String, message: String },

    /// Clone or download/extract failed for one target.
    #[error("source acquisition failed for {build_name}: {message}")]
    SourceAcquisition {
        build_name: String,
        message: String,
    },

    /// A generated build script failed for one target.
    #[error("{0}")]
    Build(#[from] cipherforge_builders::BuilderError),

    /// A filesystem or process utility failed.
    #[error("{0}")]
    Util(#[from] cipherforge_util::error::UtilError),

    /// One or more targets in a build-all run failed.
    #[error("build failed for targets: {names}")]
    TargetsFailed { names: String },
}
