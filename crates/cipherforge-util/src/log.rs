//! Logging collaborator passed into every component.
//!
//! There is no global logger; each component receives a `&dyn BuildLog`.

use crate::process::CommandOutput;

/// Destination for engine progress and diagnostics.
pub trait BuildLog: Sync {
    /// Detail useful when following a build closely.
    fn info(&self, message: &str);
    /// Something worth attention that does not fail the run.
    fn warn(&self, message: &str);
    /// A failure being reported.
    fn error(&self, message: &str);
    /// High-visibility progress line, always shown.
    fn status(&self, message: &str);
}

/// Default log writing to stderr.
#[derive(Debug, Default)]
pub struct StderrLog {
    /// When set, `info` lines are shown; otherwise only warn/error/status.
    pub verbose: bool,
}

impl BuildLog for StderrLog {
    fn info(&self, message: &str) {
        if self.verbose {
            eprintln!("{message}");
        }
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("error: {message}");
    }

    fn status(&self, message: &str) {
        eprintln!("    {message}");
    }
}

/// Report a finished command's captured output.
///
/// Stderr is surfaced before stdout regardless of exit status, so warnings
/// and errors stay visible during long builds. On failure both streams are
/// reported at error level; on success stderr lines are warnings and
/// stdout lines are info.
pub fn report_output(log: &dyn BuildLog, output: &CommandOutput) {
    if output.success {
        for line in output.stderr.lines() {
            log.warn(line);
        }
        for line in output.stdout.lines() {
            log.info(line);
        }
    } else {
        for line in output.stderr.lines() {
            log.error(line);
        }
        for line in output.stdout.lines() {
            log.error(line);
        }
    }
}
