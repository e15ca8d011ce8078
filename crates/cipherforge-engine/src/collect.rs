//! Artifact collection: glob-pattern copies into the per-target output
//! directory, plus optional mirroring to a caller-supplied sink.
//!
//! Collection is best-effort hand-off plumbing: failures are logged as
//! warnings and never flip a target's pipeline to failed.

use std::path::Path;

use cipherforge_builders::CollectSpec;
use cipherforge_util::log::BuildLog;

/// Copies build products described by [`CollectSpec`]s.
pub struct ArtifactCollector<'a> {
    pub log: &'a dyn BuildLog,
}

impl ArtifactCollector<'_> {
    /// Perform the given copies into `output_dir`. Missing source
    /// directories are skipped; copy errors are warnings.
    pub fn collect(&self, collects: &[CollectSpec], output_dir: &Path) {
        for spec in collects {
            if !spec.from.exists() {
                self.log.info(&format!(
                    "nothing to collect from {} (absent)",
                    spec.from.display()
                ));
                continue;
            }
            let dest = match &spec.into_subdir {
                Some(subdir) => output_dir.join(subdir),
                None => output_dir.to_path_buf(),
            };
            match cipherforge_util::fs::copy_matching(&spec.from, &dest, &spec.patterns) {
                Ok(copied) => {
                    self.log.info(&format!(
                        "copied {} file(s) from {} to {}",
                        copied.len(),
                        spec.from.display(),
                        dest.display()
                    ));
                }
                Err(e) => self.log.warn(&format!(
                    "artifact collection from {} failed: {e}",
                    spec.from.display()
                )),
            }
        }
    }

    /// Mirror files matching `patterns` (everything when empty) from
    /// `from` into a sink directory. Best-effort.
    pub fn mirror(&self, from: &Path, to: &Path, patterns: &[String]) {
        if !from.exists() {
            return;
        }
        match cipherforge_util::fs::copy_matching(from, to, patterns) {
            Ok(copied) => self.log.info(&format!(
                "mirrored {} file(s) to {}",
                copied.len(),
                to.display()
            )),
            Err(e) => self
                .log
                .warn(&format!("mirror to {} failed: {e}", to.display())),
        }
    }
}
