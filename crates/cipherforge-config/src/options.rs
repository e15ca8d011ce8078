//! Compiler option sets and their validation invariants.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cipherforge_targets::TargetId;

use crate::manifest::ConfigError;

/// SQLCipher's configure script forces these; supplying them is an error.
pub fn default_forced_options() -> Vec<String> {
    vec!["SQLITE_THREADSAFE".to_owned()]
}

/// SQLCipher builds cannot work without these.
pub fn default_required_options() -> Vec<String> {
    vec![
        "-DSQLITE_HAS_CODEC".to_owned(),
        "-DSQLCIPHER_CRYPTO_OPENSSL".to_owned(),
    ]
}

/// The default compiler option list: the required options plus a
/// conservative feature selection.
pub fn default_compiler_options() -> Vec<String> {
    let mut options = default_required_options();
    options.extend(
        [
            "-DNDEBUG=1",
            "-DSQLITE_OMIT_DEPRECATED",
            "-DSQLITE_OMIT_TRACE",
            "-DSQLITE_OMIT_TCL_VARIABLE",
            "-DSQLITE_OMIT_PROGRESS_CALLBACK",
            "-DSQLITE_DEFAULT_MEMSTATUS=0",
            "-DSQLITE_DEFAULT_WAL_SYNCHRONOUS=1",
            "-DSQLITE_OMIT_SHARED_CACHE",
            "-DSQLITE_ENABLE_COLUMN_METADATA",
            "-DSQLITE_MAX_EXPR_DEPTH=0",
            "-DSQLITE_DQS=0",
            "-DSQLITE_DEFAULT_FOREIGN_KEYS=1",
            "-DSQLITE_ENABLE_RTREE",
            "-DSQLITE_ENABLE_STAT3",
            "-DSQLITE_ENABLE_STAT4",
            "-DSQLITE_ENABLE_FTS3_PARENTHESIS",
            "-DSQLITE_ENABLE_FTS4",
            "-DSQLITE_ENABLE_FTS5",
            "-DSQLITE_INTROSPECTION_PRAGMAS",
        ]
        .map(str::to_owned),
    );
    options
}

/// Extra options Android builds commonly want; originated in SQLCipher's
/// own Android build process.
pub fn android_compiler_options() -> Vec<String> {
    [
        "-DSQLITE_SOUNDEX",
        "-DHAVE_USLEEP=1",
        "-DSQLITE_MAX_VARIABLE_NUMBER=99999",
        "-DSQLITE_TEMP_STORE=3",
        "-DSQLITE_DEFAULT_JOURNAL_SIZE_LIMIT=1048576",
        "-DSQLITE_ENABLE_MEMORY_MANAGEMENT=1",
        "-DSQLITE_ENABLE_UNLOCK_NOTIFY",
        "-DSQLITE_ENABLE_DBSTAT_VTAB",
        "-DSQLITE_OMIT_AUTORESET",
        "-DSQLITE_OMIT_BUILTIN_TEST",
        "-DSQLITE_OMIT_LOAD_EXTENSION",
    ]
    .map(str::to_owned)
    .to_vec()
}

/// Base options shared by every Apple build.
pub fn apple_compiler_options() -> Vec<String> {
    [
        "-fno-common",
        "-DSQLITE_ENABLE_API_ARMOR",
        "-DSQLITE_ENABLE_UPDATE_DELETE_LIMIT",
        "-DSQLITE_OMIT_AUTORESET",
        "-DSQLITE_OMIT_BUILTIN_TEST",
        "-DSQLITE_OMIT_LOAD_EXTENSION",
        "-DSQLITE_SYSTEM_MALLOC",
        "-DSQLITE_THREADSAFE=2",
        "-DSQLITE_OS_UNIX=1",
    ]
    .map(str::to_owned)
    .to_vec()
}

/// macOS additions: the locking-style workaround for NFS home directories.
pub fn macos_compiler_options() -> Vec<String> {
    let mut options = apple_compiler_options();
    options.push("-DSQLITE_ENABLE_LOCKING_STYLE=1".to_owned());
    options
}

/// iOS additions on top of the shared Apple set.
pub fn ios_compiler_options() -> Vec<String> {
    let mut options = apple_compiler_options();
    options.extend(
        [
            "-DSQLITE_MAX_MMAP_SIZE=0",
            "-DSQLITE_ENABLE_LOCKING_STYLE=0",
            "-DSQLITE_TEMP_STORE=3",
            "-fembed-bitcode",
            "-Wno-#warnings",
        ]
        .map(str::to_owned),
    );
    options
}

/// Compiler options: an ordered base list plus per-target override lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsSection {
    /// Base options applied to every target, in order.
    pub compiler_options: Vec<String>,
    /// Per-target additions, appended after the base options. Keys are
    /// target ids; entries for unselected targets are ignored.
    pub target_compiler_options: BTreeMap<String, Vec<String>>,
    /// Options the configure script forces; never user-supplied.
    pub forced: Vec<String>,
    /// Options that must always be present.
    pub required: Vec<String>,
}

impl Default for OptionsSection {
    fn default() -> Self {
        Self {
            compiler_options: default_compiler_options(),
            target_compiler_options: BTreeMap::new(),
            forced: default_forced_options(),
            required: default_required_options(),
        }
    }
}

impl OptionsSection {
    /// Merge base options with the target's overrides: base first, then
    /// overrides. Duplicates are preserved and order is significant: the
    /// C compiler resolves repeated flags last-wins.
    pub fn merged_for(&self, target: TargetId) -> Vec<String> {
        let mut merged = self.compiler_options.clone();
        if let Some(extra) = self.target_compiler_options.get(target.as_str()) {
            merged.extend(extra.iter().cloned());
        }
        merged
    }

    /// Enforce the two option invariants.
    ///
    /// # Errors
    /// Returns [`ConfigError::ForcedOption`] if any forced option was
    /// user-supplied, or [`ConfigError::MissingRequiredOption`] naming the
    /// first required option that is absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for forced in &self.forced {
            if self.compiler_options.iter().any(|o| o == forced) {
                return Err(ConfigError::ForcedOption {
                    option: forced.clone(),
                });
            }
        }
        for required in &self.required {
            if !self.compiler_options.iter().any(|o| o == required) {
                return Err(ConfigError::MissingRequiredOption {
                    option: required.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Join options into the single space-separated string the generated
/// scripts embed.
pub fn options_string(options: &[String]) -> String {
    let mut joined = String::new();
    for option in options {
        joined.push_str(option);
        joined.push(' ');
    }
    joined
}
