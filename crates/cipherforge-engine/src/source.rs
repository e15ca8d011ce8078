//! Source acquisition: shallow single-tag clone or archive download,
//! memoized so repeated runs are cheap and safe.

use std::path::{Path, PathBuf};

use cipherforge_config::manifest::{OpensslSection, SqlcipherSection};
use cipherforge_config::BuildConfig;
use cipherforge_targets::{HostOs, TargetId};
use cipherforge_util::log::{report_output, BuildLog};
use cipherforge_util::process::{CommandRunner, CommandSpec};

use crate::error::EngineError;

/// Name of the shared clone directory under a component's source root.
const GIT_DIR: &str = "git";

/// Everything needed to acquire one component's source.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    /// Component label ("openssl" / "sqlcipher") for logs and errors.
    pub build_name: &'static str,
    /// `true` = clone-and-checkout, `false` = download-and-extract.
    /// Exactly one mode is active for an entire run.
    pub use_git: bool,
    pub git_uri: String,
    pub tag: String,
    pub download_url: String,
    pub archive_file_name: String,
    /// Directory name under the workroot for this component.
    pub src_directory: String,
    /// The archive's own top-level directory, which becomes the per-target
    /// source tree name.
    pub archive_top_dir: String,
    /// The expected primary source file; its presence in a compile tree
    /// means acquisition has already happened there.
    pub marker_file: &'static str,
}

impl SourceSpec {
    /// Acquisition spec for OpenSSL from the manifest.
    pub fn openssl(config: &BuildConfig, host: HostOs) -> Self {
        Self {
            build_name: OpensslSection::BUILD_NAME,
            use_git: config.source.use_git,
            git_uri: config.openssl.github_uri.clone(),
            tag: config.openssl.tag_name.clone(),
            download_url: config.openssl.download_url(host),
            archive_file_name: config.openssl.download_file_name(host),
            src_directory: config.openssl.src_directory.clone(),
            archive_top_dir: config.openssl.archive_top_dir(),
            marker_file: OpensslSection::MARKER_FILE,
        }
    }

    /// Acquisition spec for SQLCipher from the manifest.
    pub fn sqlcipher(config: &BuildConfig, host: HostOs) -> Self {
        Self {
            build_name: SqlcipherSection::BUILD_NAME,
            use_git: config.source.use_git,
            git_uri: config.sqlcipher.github_uri.clone(),
            tag: config.sqlcipher.tag_name(),
            download_url: config.sqlcipher.download_url(host),
            archive_file_name: config.sqlcipher.download_file_name(host),
            src_directory: config.sqlcipher.src_directory.clone(),
            archive_top_dir: config.sqlcipher.archive_top_dir(),
            marker_file: SqlcipherSection::MARKER_FILE,
        }
    }
}

/// Acquires source trees per target, sharing the clone or archive across
/// targets. The cloned tree is read-only shared; each target gets a
/// private copy, so concurrent targets cannot corrupt each other.
pub struct SourceProvider<'a> {
    workroot: &'a Path,
    spec: SourceSpec,
    runner: &'a dyn CommandRunner,
    log: &'a dyn BuildLog,
}

impl<'a> SourceProvider<'a> {
    pub fn new(
        workroot: &'a Path,
        spec: SourceSpec,
        runner: &'a dyn CommandRunner,
        log: &'a dyn BuildLog,
    ) -> Self {
        Self {
            workroot,
            spec,
            runner,
            log,
        }
    }

    /// The component's source root: `<workroot>/<srcDirName>`.
    pub fn src_root(&self) -> PathBuf {
        self.workroot.join(&self.spec.src_directory)
    }

    /// A target's compile directory: `<srcRoot>/<targetId>`.
    pub fn compile_dir(&self, target: TargetId) -> PathBuf {
        self.src_root().join(target.as_str())
    }

    /// A target's source tree: `<compileDir>/<archiveTopDir>`.
    pub fn source_dir(&self, target: TargetId) -> PathBuf {
        self.compile_dir(target).join(&self.spec.archive_top_dir)
    }

    /// Ensure the target has a private source tree, acquiring it if the
    /// marker file is absent. Returns the source tree path.
    ///
    /// # Errors
    /// Returns a source-acquisition error if the clone, download, or
    /// extract fails, or the acquired tree is missing the marker file.
    pub fn acquire(&self, target: TargetId) -> Result<PathBuf, EngineError> {
        let source_dir = self.source_dir(target);
        if source_dir.join(self.spec.marker_file).exists() {
            self.log.info(&format!(
                "{} source for {target} already present, skipping acquisition",
                self.spec.build_name
            ));
            return Ok(source_dir);
        }

        if self.spec.use_git {
            let git_tree = self.ensure_git_tree()?;
            self.log.status(&format!(
                "Copying {} checkout for {target}",
                self.spec.build_name
            ));
            cipherforge_util::fs::copy_dir_all(&git_tree, &source_dir)?;
        } else {
            let archive = self.ensure_archive()?;
            self.log.status(&format!(
                "Extracting {} for {target}",
                self.spec.build_name
            ));
            cipherforge_util::archive::extract_archive(&archive, &self.compile_dir(target))
                .map_err(|e| EngineError::SourceAcquisition {
                    build_name: self.spec.build_name.to_owned(),
                    message: e.to_string(),
                })?;
        }

        if !source_dir.join(self.spec.marker_file).exists() {
            return Err(EngineError::SourceAcquisition {
                build_name: self.spec.build_name.to_owned(),
                message: format!(
                    "acquired tree {} is missing {}",
                    source_dir.display(),
                    self.spec.marker_file
                ),
            });
        }
        Ok(source_dir)
    }

    /// Clone the single release tag once per run into `<srcRoot>/git`.
    ///
    /// Fetching only `refs/tags/<tag>` avoids a full-history transfer; the
    /// explicit checkout then pins the working tree to the tag.
    fn ensure_git_tree(&self) -> Result<PathBuf, EngineError> {
        let git_dir = self.src_root().join(GIT_DIR);
        if git_dir.join(self.spec.marker_file).exists() {
            self.log.info(&format!(
                "{} clone already present, skipping",
                self.spec.build_name
            ));
            return Ok(git_dir);
        }

        cipherforge_util::fs::ensure_dir(&self.src_root())?;
        self.log.status(&format!(
            "Cloning {} {} (single tag)",
            self.spec.build_name, self.spec.tag
        ));

        let clone = CommandSpec::new("git")
            .args(["clone", "--depth", "1", "--branch", &self.spec.tag, "--single-branch"])
            .arg(&self.spec.git_uri)
            .arg(git_dir.display().to_string());
        self.run_git(&clone)?;

        let checkout = CommandSpec::new("git")
            .args(["checkout", &self.spec.tag])
            .current_dir(&git_dir);
        self.run_git(&checkout)?;

        Ok(git_dir)
    }

    fn run_git(&self, spec: &CommandSpec) -> Result<(), EngineError> {
        self.log.info(&format!("Starting command: {}", spec.command_line()));
        let output = self
            .runner
            .run(spec)
            .map_err(|e| EngineError::SourceAcquisition {
                build_name: self.spec.build_name.to_owned(),
                message: e.to_string(),
            })?;
        report_output(self.log, &output);
        if !output.success {
            return Err(EngineError::SourceAcquisition {
                build_name: self.spec.build_name.to_owned(),
                message: output.stderr,
            });
        }
        Ok(())
    }

    /// Download the tag archive once per run into the source root.
    fn ensure_archive(&self) -> Result<PathBuf, EngineError> {
        let archive = self.src_root().join(&self.spec.archive_file_name);
        if archive.exists() {
            self.log.info(&format!(
                "{} archive already downloaded, skipping",
                self.spec.build_name
            ));
            return Ok(archive);
        }

        cipherforge_util::fs::ensure_dir(&self.src_root())?;
        let label = format!("{} {}", self.spec.build_name, self.spec.tag);
        let result =
            cipherforge_util::download::download_to_file(&self.spec.download_url, &archive, &label)
                .map_err(|e| EngineError::SourceAcquisition {
                    build_name: self.spec.build_name.to_owned(),
                    message: e.to_string(),
                })?;
        self.log.info(&format!(
            "downloaded {} ({} bytes, sha256 {})",
            self.spec.archive_file_name, result.bytes, result.sha256
        ));
        Ok(archive)
    }
}
