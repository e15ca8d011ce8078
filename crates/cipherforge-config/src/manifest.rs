//! The `cipherforge.toml` build manifest.

use std::path::Path;

use serde::{Deserialize, Serialize};

use cipherforge_targets::{HostOs, TargetError, TargetId};

use crate::options::OptionsSection;
use crate::tools::ToolsSection;

/// Library module name SQLCipher builds produce (`sqlite3` API surface).
pub const MODULE_NAME: &str = "sqlite3";
/// The public header produced alongside the library.
pub const MODULE_HEADER: &str = "sqlite3.h";
/// The single-translation-unit amalgamation source.
pub const AMALGAMATION: &str = "sqlite3.c";

/// Archive suffix for the given host OS.
pub fn archive_suffix(host: HostOs) -> &'static str {
    if host == HostOs::Windows {
        ".zip"
    } else {
        ".tar.gz"
    }
}

/// Source acquisition mode, fixed for an entire run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// `true` clones the single release tag and works from a local copy
    /// of the checkout; `false` downloads and extracts the tag archive.
    /// Cloning is slower but leaves a repository to work from; the
    /// archive download is much quicker.
    pub use_git: bool,
}

/// OpenSSL source and configure settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpensslSection {
    pub github_uri: String,
    pub tag_name: String,
    /// Base Configure options applied to every target.
    pub configure_options: Vec<String>,
    /// Per-target Configure options, prepended before the base options.
    pub target_configure_options: std::collections::BTreeMap<String, Vec<String>>,
    /// Directory name under the workroot holding per-target compile trees.
    pub src_directory: String,
}

impl Default for OpensslSection {
    fn default() -> Self {
        let mut target_configure_options = std::collections::BTreeMap::new();
        let android = vec!["-fPIC".to_owned(), "-fstack-protector-all".to_owned()];
        let no_shared = vec!["no-dso".to_owned(), "no-async".to_owned(), "no-shared".to_owned()];
        for id in [TargetId::AndroidArm64, TargetId::AndroidX64] {
            target_configure_options.insert(id.as_str().to_owned(), android.clone());
        }
        for id in [
            TargetId::LinuxX64,
            TargetId::IosArm64,
            TargetId::IosX64,
            TargetId::MacosX64,
        ] {
            target_configure_options.insert(id.as_str().to_owned(), no_shared.clone());
        }
        Self {
            github_uri: "https://github.com/openssl/openssl".to_owned(),
            tag_name: "openssl_3.0.1".to_owned(),
            configure_options: vec!["no-asm".to_owned(), "no-weak-ssl-ciphers".to_owned()],
            target_configure_options,
            src_directory: "src-openssl".to_owned(),
        }
    }
}

impl OpensslSection {
    /// Build label used in task output and directory names.
    pub const BUILD_NAME: &'static str = "openssl";

    /// File whose presence marks an already-acquired source tree.
    pub const MARKER_FILE: &'static str = "Configure";

    /// The top-level directory inside the tag archive.
    pub fn archive_top_dir(&self) -> String {
        format!("openssl-{}", self.tag_name)
    }

    /// File name the downloaded archive is cached under.
    pub fn download_file_name(&self, host: HostOs) -> String {
        format!("{}{}", self.tag_name, archive_suffix(host))
    }

    /// Full archive download URL for the configured tag.
    pub fn download_url(&self, host: HostOs) -> String {
        format!("{}/archive/{}", self.github_uri, self.download_file_name(host))
    }

    /// Configure options for a target: target-specific options first,
    /// then the base list. Order is what the Configure script sees.
    pub fn configure_options_for(&self, target: TargetId) -> Vec<String> {
        let mut options = self
            .target_configure_options
            .get(target.as_str())
            .cloned()
            .unwrap_or_default();
        options.extend(self.configure_options.iter().cloned());
        options
    }

    /// Whether assembly optimizations are disabled (`no-asm`), which
    /// waives the assembler precondition.
    pub fn asm_disabled(&self) -> bool {
        self.configure_options.iter().any(|o| o == "no-asm")
    }
}

/// SQLCipher source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlcipherSection {
    /// When `false` the run stops after OpenSSL.
    pub build: bool,
    pub github_uri: String,
    pub version: String,
    /// Directory name under the workroot holding per-target compile trees.
    pub src_directory: String,
}

impl Default for SqlcipherSection {
    fn default() -> Self {
        Self {
            build: true,
            github_uri: "https://github.com/sqlcipher/sqlcipher".to_owned(),
            version: "4.5.0".to_owned(),
            src_directory: "src-sqlcipher".to_owned(),
        }
    }
}

impl SqlcipherSection {
    /// Build label used in task output and directory names.
    pub const BUILD_NAME: &'static str = "sqlcipher";

    /// File whose presence marks an already-acquired source tree.
    pub const MARKER_FILE: &'static str = "configure";

    /// The release tag for the configured version.
    pub fn tag_name(&self) -> String {
        format!("v{}", self.version)
    }

    /// The top-level directory inside the tag archive.
    pub fn archive_top_dir(&self) -> String {
        format!("sqlcipher-{}", self.version)
    }

    /// File name the downloaded archive is cached under.
    pub fn download_file_name(&self, host: HostOs) -> String {
        format!("{}{}", self.tag_name(), archive_suffix(host))
    }

    /// Full archive download URL for the configured version.
    pub fn download_url(&self, host: HostOs) -> String {
        format!("{}/archive/{}", self.github_uri, self.download_file_name(host))
    }
}

/// The `cipherforge.toml` manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Selected target ids. Targets the current host cannot build are
    /// skipped with a notice, so one list can serve every CI host.
    pub builds: Vec<String>,
    pub source: SourceSection,
    pub options: OptionsSection,
    pub openssl: OpensslSection,
    pub sqlcipher: SqlcipherSection,
    pub tools: ToolsSection,
    /// Directory name under the workroot receiving collected artifacts.
    pub targets_directory: String,
    /// Also copy public headers (and `libcrypto.*`) into the output sink.
    pub copy_headers: bool,
}

impl BuildConfig {
    /// Read and parse a `cipherforge.toml` from the given path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or contains invalid TOML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_str(&content, &path.display().to_string())
    }

    /// Parse manifest content, with `origin` used in error messages.
    ///
    /// # Errors
    /// Returns an error if the content is not valid manifest TOML.
    pub fn from_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: origin.to_owned(),
            source: e,
        })?;
        if config.targets_directory.is_empty() {
            config.targets_directory = "targets".to_owned();
        }
        Ok(config)
    }

    /// Parse the selected target ids.
    ///
    /// # Errors
    /// Returns an error naming the first id that is not in the catalog.
    pub fn selected_targets(&self) -> Result<Vec<TargetId>, ConfigError> {
        self.builds
            .iter()
            .map(|name| name.parse::<TargetId>().map_err(ConfigError::from))
            .collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid cipherforge.toml at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    /// A forced option was user-supplied.
    #[error("the configure script requires a specific setting for {option}; do not supply it")]
    ForcedOption { option: String },

    /// A required option is absent.
    #[error("builds cannot work without compiler option {option}")]
    MissingRequiredOption { option: String },

    #[error("{0}")]
    Target(#[from] TargetError),

    #[error("Android NDK version {version} has an unsupported format")]
    InvalidNdkVersion { version: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_directory_is_set() {
        let config = BuildConfig::from_str("", "test").unwrap();
        assert_eq!(config.targets_directory, "targets");
    }

    #[test]
    fn minimal_manifest_parses_with_defaults() {
        let config = BuildConfig::from_str(
            "builds = [\"linuxX64\", \"androidArm64\"]\n",
            "test",
        )
        .unwrap();
        assert_eq!(
            config.selected_targets().unwrap(),
            vec![TargetId::LinuxX64, TargetId::AndroidArm64]
        );
        assert!(!config.source.use_git);
        assert!(config.sqlcipher.build);
        assert_eq!(config.sqlcipher.version, "4.5.0");
    }

    #[test]
    fn invalid_target_name_is_an_error() {
        let config = BuildConfig::from_str("builds = [\"linux64\"]\n", "test").unwrap();
        assert!(config.selected_targets().is_err());
    }

    #[test]
    fn manifest_sections_override_defaults() {
        let content = r#"
builds = ["linuxX64"]

[source]
use_git = true

[sqlcipher]
version = "4.5.1"

[openssl]
tag_name = "openssl_3.0.2"

[tools.android]
ndk_version = "22.1.7171670"
minimum_sdk = 24
"#;
        let config = BuildConfig::from_str(content, "test").unwrap();
        assert!(config.source.use_git);
        assert_eq!(config.sqlcipher.tag_name(), "v4.5.1");
        assert_eq!(config.sqlcipher.archive_top_dir(), "sqlcipher-4.5.1");
        assert_eq!(config.openssl.archive_top_dir(), "openssl-openssl_3.0.2");
        assert!(config.tools.android.r22_or_later().unwrap());
        assert_eq!(config.tools.android.minimum_sdk, 24);
    }

    #[test]
    fn download_names_follow_host_suffix() {
        let openssl = OpensslSection::default();
        assert_eq!(
            openssl.download_file_name(HostOs::Windows),
            "openssl_3.0.1.zip"
        );
        assert_eq!(
            openssl.download_file_name(HostOs::Linux),
            "openssl_3.0.1.tar.gz"
        );
        assert_eq!(
            openssl.download_url(HostOs::Linux),
            "https://github.com/openssl/openssl/archive/openssl_3.0.1.tar.gz"
        );

        let sqlcipher = SqlcipherSection::default();
        assert_eq!(sqlcipher.download_file_name(HostOs::Mac), "v4.5.0.tar.gz");
        assert_eq!(
            sqlcipher.download_url(HostOs::Windows),
            "https://github.com/sqlcipher/sqlcipher/archive/v4.5.0.zip"
        );
    }

    #[test]
    fn openssl_target_options_are_prepended() {
        let section = OpensslSection::default();
        let options = section.configure_options_for(TargetId::AndroidArm64);
        assert_eq!(
            options,
            vec!["-fPIC", "-fstack-protector-all", "no-asm", "no-weak-ssl-ciphers"]
        );
        // A target with no specific options gets just the base list.
        let plain = section.configure_options_for(TargetId::MingwX64);
        assert_eq!(plain, vec!["no-asm", "no-weak-ssl-ciphers"]);
    }

    #[test]
    fn asm_disabled_tracks_no_asm() {
        let mut section = OpensslSection::default();
        assert!(section.asm_disabled());
        section.configure_options = vec!["no-weak-ssl-ciphers".to_owned()];
        assert!(!section.asm_disabled());
    }

    #[test]
    fn from_path_missing_file_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let result = BuildConfig::from_path(&tmp.path().join("cipherforge.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn from_path_reads_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cipherforge.toml");
        std::fs::write(&path, "builds = [\"macosX64\"]\n").unwrap();
        let config = BuildConfig::from_path(&path).unwrap();
        assert_eq!(config.selected_targets().unwrap(), vec![TargetId::MacosX64]);
    }
}
