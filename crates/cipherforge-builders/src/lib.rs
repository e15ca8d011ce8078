#![forbid(unsafe_code)]
//! Per-family build strategies for Cipherforge.
//!
//! Each toolchain family turns (source directory, OpenSSL include/lib
//! directories, merged compiler options) into one generated script, runs
//! it through the shared [`CommandRunner`] seam, and describes where its
//! products land. Script text is a pure function of its inputs, written
//! under a fixed name so it survives the run for inspection.

pub mod amalgamation;
pub mod android;
pub mod apple;
pub mod error;
pub mod openssl;
pub mod script;
pub mod sqlcipher;

use std::path::PathBuf;

use cipherforge_config::BuildConfig;
use cipherforge_targets::{HostOs, TargetId};
use cipherforge_util::log::BuildLog;
use cipherforge_util::process::CommandRunner;

pub use error::BuilderError;

/// Artifact glob patterns for Visual Studio builds.
pub const WINDOWS_PATTERNS: &[&str] = &["*.lib", "*.dll", "*.exe"];
/// Artifact glob patterns for MinGW builds.
pub const MINGW_PATTERNS: &[&str] = &["*.a", "*.dll", "*.pc", "*.rc", "*.def", "*.o"];
/// Artifact glob patterns for Linux and Android builds.
pub const LINUX_PATTERNS: &[&str] = &["sqlcipher", "*.a", "*.so", "*.pc", "*.map", "*.so.*"];
/// Artifact glob patterns for Apple builds.
pub const APPLE_PATTERNS: &[&str] = &["*.a"];

/// Everything a family builder needs beyond the source tree itself.
pub struct BuildContext<'a> {
    pub target: TargetId,
    pub host: HostOs,
    pub config: &'a BuildConfig,
    pub runner: &'a dyn CommandRunner,
    pub log: &'a dyn BuildLog,
}

/// One copy the collector should perform after a build: files matching
/// `patterns` under `from`, optionally into a subdirectory of the target
/// output directory. An empty pattern list copies every file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectSpec {
    pub from: PathBuf,
    pub patterns: Vec<String>,
    pub into_subdir: Option<String>,
}

impl CollectSpec {
    /// Copy files matching `patterns` from `from` into the output root.
    pub fn new(from: PathBuf, patterns: &[&str]) -> Self {
        Self {
            from,
            patterns: patterns.iter().map(|p| (*p).to_owned()).collect(),
            into_subdir: None,
        }
    }

    /// Copy everything under `from` into the output root.
    pub fn all(from: PathBuf) -> Self {
        Self {
            from,
            patterns: Vec::new(),
            into_subdir: None,
        }
    }

    /// Redirect this copy into a subdirectory of the output root.
    #[must_use]
    pub fn into_subdir(mut self, subdir: &str) -> Self {
        self.into_subdir = Some(subdir.to_owned());
        self
    }
}

/// Result of a successful family build: what to collect, plus the
/// combined output of the build script for diagnostics.
#[derive(Debug)]
pub struct BuildProducts {
    pub collects: Vec<CollectSpec>,
    pub stdout: String,
    pub stderr: String,
}
