//! Error types for cipherforge-util.

/// Errors produced by utility functions.
#[derive(Debug, thiserror::Error)]
pub enum UtilError {
    /// An I/O operation failed.
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A glob pattern was invalid.
    #[error("invalid glob pattern `{pattern}`: {message}")]
    GlobPattern { pattern: String, message: String },

    /// A command failed to spawn (binary missing, permission denied).
    #[error("cannot execute `{program}`: {source}")]
    CommandExec {
        program: String,
        source: std::io::Error,
    },

    /// A download failed.
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },

    /// An archive could not be extracted.
    #[error("cannot extract {path}: {message}")]
    Archive { path: String, message: String },

    /// An archive file name has no recognized suffix.
    #[error("unrecognized archive suffix on {path} — expected .zip or .tar.gz")]
    UnknownArchiveKind { path: String },
}
