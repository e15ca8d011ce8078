#![forbid(unsafe_code)]
//! Declarative configuration for Cipherforge builds.
//!
//! The `cipherforge.toml` manifest selects build targets, sets compiler
//! and configure options, chooses the source acquisition mode, and points
//! at host toolchain installs. Defaults reproduce a working SQLCipher +
//! OpenSSL build so a minimal manifest only needs a `builds` list.

pub mod manifest;
pub mod options;
pub mod tools;

pub use manifest::{BuildConfig, ConfigError};
