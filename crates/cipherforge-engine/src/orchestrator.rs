//! The per-target pipeline and the aggregate build-all / clean surface.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use cipherforge_builders::{openssl, sqlcipher, BuildContext};
use cipherforge_config::manifest::{OpensslSection, SqlcipherSection};
use cipherforge_config::BuildConfig;
use cipherforge_targets::{descriptor, supported_on, HostOs, TargetId, ToolchainFamily};
use cipherforge_util::log::BuildLog;
use cipherforge_util::process::CommandRunner;

use crate::collect::ArtifactCollector;
use crate::error::EngineError;
use crate::pipeline::{PipelineStage, StageState, TargetOutcome};
use crate::source::{SourceProvider, SourceSpec};
use crate::verify::Verifier;

/// Caller-supplied sink: maps a target id to a directory that should
/// receive a mirror of its collected artifacts, or `None` for no copy.
pub type OutputSink = dyn Fn(TargetId) -> Option<PathBuf> + Sync;

/// Headers mirrored for Windows-only targets when `copy_headers` is set.
const WINDOWS_EXTRA_HEADERS: &[&str] = &["sqlcipher.h", "sqliteInt.h", "vdbeInt.h"];

/// Wires host detection, source acquisition, verification, the platform
/// builders, and artifact collection into per-target pipelines.
pub struct Orchestrator<'a> {
    config: &'a BuildConfig,
    workroot: PathBuf,
    host: HostOs,
    runner: &'a dyn CommandRunner,
    log: &'a dyn BuildLog,
    sink: Option<&'a OutputSink>,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator for the detected host.
    ///
    /// # Errors
    /// Returns an error if the host is unsupported, the option invariants
    /// are violated, or a selected target id is invalid; all fatal
    /// before any target runs.
    pub fn new(
        config: &'a BuildConfig,
        workroot: &Path,
        runner: &'a dyn CommandRunner,
        log: &'a dyn BuildLog,
    ) -> Result<Self, EngineError> {
        let host = HostOs::query()?;
        Self::with_host(config, workroot, host, runner, log)
    }

    /// Create an orchestrator for an explicit host.
    ///
    /// # Errors
    /// Returns an error if the option invariants are violated or a
    /// selected target id is invalid.
    pub fn with_host(
        config: &'a BuildConfig,
        workroot: &Path,
        host: HostOs,
        runner: &'a dyn CommandRunner,
        log: &'a dyn BuildLog,
    ) -> Result<Self, EngineError> {
        config.options.validate()?;
        config.selected_targets()?;
        Ok(Self {
            config,
            workroot: workroot.to_path_buf(),
            host,
            runner,
            log,
            sink: None,
        })
    }

    /// Attach an output sink that receives per-target artifact mirrors.
    #[must_use]
    pub fn with_output_sink(mut self, sink: &'a OutputSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// The collected-artifact directory for one component and target:
    /// `<workroot>/<targetsDirName>/<buildName>/<targetId>`.
    pub fn output_dir(&self, build_name: &str, target: TargetId) -> PathBuf {
        self.workroot
            .join(&self.config.targets_directory)
            .join(build_name)
            .join(target.as_str())
    }

    /// Run the full Verify → AcquireSource → Build → Collect pipeline for
    /// one target.
    ///
    /// A target the host cannot build is skipped with an "ignoring"
    /// notice and zero side effects. Not an error: a single
    /// declarative target list can be shared across CI hosts.
    ///
    /// # Errors
    /// Returns the failing stage's error; sibling targets are unaffected.
    pub fn run_target(&self, target: TargetId) -> Result<TargetOutcome, EngineError> {
        if !supported_on(target, self.host) {
            self.log.status(&format!(
                "Ignoring build target {target} on host OS {}",
                self.host
            ));
            return Ok(TargetOutcome::ignored(target));
        }

        let mut outcome = TargetOutcome::new(target);

        // Verify gate: no expensive work before the toolchain checks out.
        outcome.set(PipelineStage::Verify, StageState::Running);
        let verifier = Verifier {
            config: self.config,
            host: self.host,
            runner: self.runner,
            log: self.log,
        };
        let verified = match verifier.verify(target) {
            Ok(v) => v,
            Err(e) => return Err(self.fail(&mut outcome, PipelineStage::Verify, e)),
        };
        outcome.set(PipelineStage::Verify, StageState::Succeeded);

        // The effective config pins the NDK version verification resolved.
        let mut effective = self.config.clone();
        if let Some(version) = verified.ndk_version {
            effective.tools.android.ndk_version = version;
        }

        outcome.set(PipelineStage::AcquireSource, StageState::Running);
        let openssl_provider = SourceProvider::new(
            &self.workroot,
            SourceSpec::openssl(&effective, self.host),
            self.runner,
            self.log,
        );
        let openssl_src = match openssl_provider.acquire(target) {
            Ok(dir) => dir,
            Err(e) => return Err(self.fail(&mut outcome, PipelineStage::AcquireSource, e)),
        };
        let sqlcipher_src = if effective.sqlcipher.build {
            let provider = SourceProvider::new(
                &self.workroot,
                SourceSpec::sqlcipher(&effective, self.host),
                self.runner,
                self.log,
            );
            match provider.acquire(target) {
                Ok(dir) => Some(dir),
                Err(e) => return Err(self.fail(&mut outcome, PipelineStage::AcquireSource, e)),
            }
        } else {
            None
        };
        outcome.set(PipelineStage::AcquireSource, StageState::Succeeded);

        outcome.set(PipelineStage::Build, StageState::Running);
        let ctx = BuildContext {
            target,
            host: self.host,
            config: &effective,
            runner: self.runner,
            log: self.log,
        };
        let collector = ArtifactCollector { log: self.log };

        self.log.status(&format!("Building {} for {target}", OpensslSection::BUILD_NAME));
        let openssl_products = match openssl::build_openssl(&ctx, &openssl_src) {
            Ok(products) => products,
            Err(e) => return Err(self.fail(&mut outcome, PipelineStage::Build, e.into())),
        };
        // OpenSSL products are collected as part of the build step: the
        // SQLCipher link consumes them from the collected location.
        let openssl_out = self.output_dir(OpensslSection::BUILD_NAME, target);
        collector.collect(&openssl_products.collects, &openssl_out);

        let sqlcipher_products = match &sqlcipher_src {
            Some(src) => {
                self.log.status(&format!(
                    "Building {} for {target}",
                    SqlcipherSection::BUILD_NAME
                ));
                let openssl_include = openssl_src.join("include");
                match sqlcipher::build_sqlcipher(
                    &ctx,
                    &effective.tools.android,
                    src,
                    &openssl_include,
                    &openssl_out,
                ) {
                    Ok(products) => Some(products),
                    Err(e) => return Err(self.fail(&mut outcome, PipelineStage::Build, e.into())),
                }
            }
            None => None,
        };
        outcome.set(PipelineStage::Build, StageState::Succeeded);

        outcome.set(PipelineStage::Collect, StageState::Running);
        let output_dir = match &sqlcipher_products {
            Some(products) => {
                let dir = self.output_dir(SqlcipherSection::BUILD_NAME, target);
                collector.collect(&products.collects, &dir);
                dir
            }
            None => openssl_out.clone(),
        };
        self.mirror_to_sink(&collector, target, &output_dir, &openssl_out, sqlcipher_src.as_deref());
        outcome.set(PipelineStage::Collect, StageState::Succeeded);

        if let Some(products) = sqlcipher_products {
            outcome.stdout = products.stdout;
            outcome.stderr = products.stderr;
        } else {
            outcome.stdout = openssl_products.stdout;
            outcome.stderr = openssl_products.stderr;
        }
        outcome.output_dir = Some(output_dir);
        outcome.success = true;
        Ok(outcome)
    }

    /// Run every selected target (in parallel) and return the map of
    /// output directories for targets that produced artifacts.
    ///
    /// All targets run to completion before failure is reported, so one
    /// broken target never halts its siblings.
    ///
    /// # Errors
    /// Returns an error naming every failed target, after all have run.
    pub fn build_all(&self) -> Result<BTreeMap<TargetId, PathBuf>, EngineError> {
        let selected = self.config.selected_targets()?;
        let results: Vec<(TargetId, Result<TargetOutcome, EngineError>)> = selected
            .par_iter()
            .map(|target| (*target, self.run_target(*target)))
            .collect();

        let mut outputs = BTreeMap::new();
        let mut failed = Vec::new();
        for (target, result) in results {
            match result {
                Ok(outcome) => {
                    if let Some(dir) = outcome.output_dir {
                        outputs.insert(target, dir);
                    }
                }
                Err(e) => {
                    self.log.error(&format!("{target}: {e}"));
                    failed.push(target.to_string());
                }
            }
        }
        if !failed.is_empty() {
            return Err(EngineError::TargetsFailed {
                names: failed.join(", "),
            });
        }
        Ok(outputs)
    }

    /// Delete one target's collected output directories and cached
    /// compile subdirectories, plus any cached file at a component source
    /// root whose name starts with the versioned archive name (covering
    /// both acquisition strategies). Other targets' state is untouched.
    ///
    /// # Errors
    /// Returns an error if a directory or file cannot be removed.
    pub fn clean(&self, target: TargetId) -> Result<(), EngineError> {
        let components: [(&str, &str, String); 2] = [
            (
                OpensslSection::BUILD_NAME,
                &self.config.openssl.src_directory,
                self.config.openssl.tag_name.clone(),
            ),
            (
                SqlcipherSection::BUILD_NAME,
                &self.config.sqlcipher.src_directory,
                self.config.sqlcipher.tag_name(),
            ),
        ];

        for (build_name, src_directory, archive_prefix) in components {
            cipherforge_util::fs::remove_dir_all_if_exists(&self.output_dir(build_name, target))?;

            let src_root = self.workroot.join(src_directory);
            cipherforge_util::fs::remove_dir_all_if_exists(&src_root.join(target.as_str()))?;

            if !src_root.is_dir() {
                continue;
            }
            let entries = std::fs::read_dir(&src_root).map_err(|source| {
                EngineError::Util(cipherforge_util::error::UtilError::Io {
                    path: src_root.display().to_string(),
                    source,
                })
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| {
                    EngineError::Util(cipherforge_util::error::UtilError::Io {
                        path: src_root.display().to_string(),
                        source,
                    })
                })?;
                let path = entry.path();
                let is_cached_archive = path.is_file()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| name.starts_with(archive_prefix.as_str()));
                if is_cached_archive {
                    cipherforge_util::fs::remove_file_if_exists(&path)?;
                }
            }
        }
        self.log.status(&format!("Cleaned {target}"));
        Ok(())
    }

    fn fail(
        &self,
        outcome: &mut TargetOutcome,
        stage: PipelineStage,
        error: EngineError,
    ) -> EngineError {
        outcome.set(stage, StageState::Failed);
        outcome.skip_pending();
        self.log
            .error(&format!("{} failed for {}: {error}", stage, outcome.target));
        error
    }

    fn mirror_to_sink(
        &self,
        collector: &ArtifactCollector<'_>,
        target: TargetId,
        output_dir: &Path,
        openssl_out: &Path,
        sqlcipher_src: Option<&Path>,
    ) {
        let Some(sink) = self.sink else {
            return;
        };
        let Some(sink_dir) = sink(target) else {
            return;
        };

        collector.mirror(output_dir, &sink_dir, &[]);
        if !self.config.copy_headers {
            return;
        }
        collector.mirror(openssl_out, &sink_dir, &["libcrypto.*".to_owned()]);

        // Windows-only targets also publish SQLCipher's internal headers
        // for cinterop consumers.
        let windows_only = matches!(
            descriptor(target).toolchain,
            ToolchainFamily::Msvc | ToolchainFamily::Mingw
        );
        if windows_only {
            if let Some(src) = sqlcipher_src {
                let headers: Vec<String> =
                    WINDOWS_EXTRA_HEADERS.iter().map(|h| (*h).to_owned()).collect();
                collector.mirror(&src.join("src"), &sink_dir, &headers);
            }
        }
    }
}
