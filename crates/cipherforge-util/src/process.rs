//! External process execution for Cipherforge.
//!
//! Every external tool the engine touches (git, perl, nasm, make,
//! ndk-build, clang, cmd.exe) is described as a [`CommandSpec`] and run
//! through the [`CommandRunner`] trait, so tests substitute a stub runner
//! and dry-run whole pipelines without spawning a single process.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::UtilError;

/// A fully described external command, as pure data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Positional arguments, in order.
    pub args: Vec<String>,
    /// Working directory, or `None` to inherit.
    pub current_dir: Option<PathBuf>,
    /// Environment overrides applied to this single invocation only.
    pub env: BTreeMap<String, String>,
}

impl CommandSpec {
    /// Create a spec for the given program with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: BTreeMap::new(),
        }
    }

    /// Append a single argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set an environment variable for this invocation only.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Render the command line for log output.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Structured output from a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Executes [`CommandSpec`]s. Implemented by [`SystemRunner`] for real
/// builds and by recording stubs in tests.
///
/// A non-zero exit code is **not** a runner error; callers inspect
/// [`CommandOutput::success`]. Only a failure to spawn is an `Err`.
pub trait CommandRunner: Sync {
    /// Execute the command and capture its output.
    ///
    /// # Errors
    /// Returns an error if the command cannot be spawned.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, UtilError>;
}

/// Runs commands on the real system via `std::process::Command`.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, UtilError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|source| UtilError::CommandExec {
            program: spec.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            success: output.status.success(),
            exit_code: output.status.code(),
        })
    }
}

/// Build a spec that runs a generated shell script in its directory.
///
/// The script is invoked as `./<name>` with the script's directory as the
/// working directory, matching how the generated build scripts reference
/// relative paths.
pub fn shell_script_spec(dir: &Path, script_name: &str) -> CommandSpec {
    CommandSpec::new(format!("./{script_name}")).current_dir(dir)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn run_captures_stdout() {
        let spec = CommandSpec::new("echo").arg("hello");
        let output = SystemRunner.run(&spec).unwrap();
        assert!(output.success);
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.exit_code, Some(0));
    }

    #[test]
    fn run_reports_failure_exit() {
        let output = SystemRunner.run(&CommandSpec::new("false")).unwrap();
        assert!(!output.success);
        assert_ne!(output.exit_code, Some(0));
    }

    #[test]
    fn run_missing_binary_is_spawn_error() {
        let result = SystemRunner.run(&CommandSpec::new("no_such_binary_xyz_813"));
        assert!(result.is_err());
    }

    #[test]
    fn run_captures_stderr() {
        let spec = CommandSpec::new("sh").args(["-c", "echo err >&2"]);
        let output = SystemRunner.run(&spec).unwrap();
        assert!(output.stderr.contains("err"));
    }

    #[test]
    fn run_applies_env_and_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo $FORGE_PROBE; pwd"])
            .env("FORGE_PROBE", "probe-value")
            .current_dir(tmp.path());
        let output = SystemRunner.run(&spec).unwrap();
        assert!(output.stdout.contains("probe-value"));
    }

    #[test]
    fn command_line_joins_program_and_args() {
        let spec = CommandSpec::new("git").args(["clone", "--depth", "1"]);
        assert_eq!(spec.command_line(), "git clone --depth 1");
    }

    #[test]
    fn shell_script_spec_is_relative_invocation() {
        let spec = shell_script_spec(Path::new("/work"), "forge-build.sh");
        assert_eq!(spec.program, "./forge-build.sh");
        assert_eq!(spec.current_dir, Some(PathBuf::from("/work")));
    }
}
