//! Error types for cipherforge-builders.

/// Errors produced while generating or executing build scripts.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    /// A generated script exited non-zero. The captured stderr is carried
    /// verbatim so build diagnostics survive into the error message.
    #[error("build script {script} failed (exit code {code:?}):\n{stderr}")]
    ExecutionFailed {
        script: String,
        code: Option<i32>,
        stderr: String,
        stdout: String,
    },

    /// The amalgamation pre-step did not produce its translation unit.
    #[error("amalgamation {path} not found")]
    AmalgamationMissing { path: String },

    /// A build reported success but the expected product is absent.
    #[error("build failed — expected product missing: {path}\n{output}")]
    ProductMissing { path: String, output: String },

    /// A target reached a family builder it does not belong to.
    #[error("target {target} is not supported by the {family} build strategy")]
    WrongFamily {
        target: String,
        family: &'static str,
    },

    #[error("{0}")]
    Util(#[from] cipherforge_util::error::UtilError),

    #[error("{0}")]
    Config(#[from] cipherforge_config::ConfigError),
}
