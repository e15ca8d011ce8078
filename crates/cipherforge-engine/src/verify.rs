//! Per-target toolchain verification, run before any expensive work.

use std::path::Path;

use cipherforge_config::BuildConfig;
use cipherforge_targets::{descriptor, HostOs, TargetId, ToolchainFamily};
use cipherforge_util::log::BuildLog;
use cipherforge_util::process::{CommandRunner, CommandSpec};

use crate::error::EngineError;

const PERL_RESPONSE_PREFIX: &str = "This is perl";
const NASM_RESPONSE_PREFIX: &str = "NASM version ";

/// One verified toolchain component and the version it reported.
#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub component: String,
    pub version: Option<String>,
}

/// Result of verifying one target's toolchain.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub reports: Vec<VerifyReport>,
    /// For Android targets: the NDK version actually resolved (the
    /// configured one, or the newest installed when none was pinned).
    pub ndk_version: Option<String>,
}

/// Confirms the required external toolchain is present per target family
/// and records reported versions. Tools are probed through the
/// [`CommandRunner`] so verification is stubbable.
pub struct Verifier<'a> {
    pub config: &'a BuildConfig,
    pub host: HostOs,
    pub runner: &'a dyn CommandRunner,
    pub log: &'a dyn BuildLog,
}

impl Verifier<'_> {
    /// Verify the toolchain for one target.
    ///
    /// # Errors
    /// Returns [`EngineError::Precondition`] naming the missing component
    /// and its expected location. The failure halts only this target's
    /// pipeline, never sibling targets.
    pub fn verify(&self, target: TargetId) -> Result<VerifyOutcome, EngineError> {
        match descriptor(target).toolchain {
            ToolchainFamily::Msvc => self.verify_msvc(),
            ToolchainFamily::Mingw => self.verify_mingw(),
            ToolchainFamily::AndroidNdk => self.verify_android(),
            ToolchainFamily::LinuxGnu | ToolchainFamily::AppleClang => self.verify_unix(),
        }
    }

    /// Visual Studio family: the vendor environment bootstrap file and a
    /// Windows-oriented perl must exist.
    fn verify_msvc(&self) -> Result<VerifyOutcome, EngineError> {
        let windows = &self.config.tools.windows;

        let env_file = windows.vstudio_env_file();
        if !env_file.exists() {
            return Err(precondition(
                "Visual Studio",
                format!("environment file does not exist: {}", env_file.display()),
            ));
        }
        if !Path::new(&windows.sdk_install).exists() {
            return Err(precondition(
                "Windows SDK",
                format!("install directory does not exist: {}", windows.sdk_install),
            ));
        }
        if windows.perl_install_directory.is_empty() {
            return Err(precondition(
                "perl",
                "Visual Studio builds require a Windows-oriented perl; set tools.windows.perl_install_directory".to_owned(),
            ));
        }
        let perl = windows.windows_perl();
        if !perl.exists() {
            return Err(precondition(
                "perl",
                format!("Windows perl does not exist: {}", perl.display()),
            ));
        }

        let report = self.probe_perl(&perl.display().to_string())?;
        self.log.info(&format!(
            "Visual Studio install verified, location: {}",
            windows.visual_studio_install
        ));
        Ok(VerifyOutcome {
            reports: vec![report],
            ndk_version: None,
        })
    }

    /// MinGW family: the MSYS2 POSIX layer and its Linux-oriented perl
    /// must exist.
    fn verify_mingw(&self) -> Result<VerifyOutcome, EngineError> {
        let windows = &self.config.tools.windows;

        if windows.msys2_install_directory.is_empty() {
            return Err(precondition(
                "MSYS2",
                "set tools.windows.msys2_install_directory for MinGW builds".to_owned(),
            ));
        }
        let mingw = windows.mingw_install_directory();
        if !mingw.exists() {
            return Err(precondition(
                "MinGW-w64",
                format!("install directory does not exist: {}", mingw.display()),
            ));
        }
        let gcc = mingw.join("bin").join("gcc.exe");
        if !gcc.exists() {
            return Err(precondition(
                "MinGW-w64",
                format!(
                    "gcc.exe not found at {} — install mingw-w64-x86_64-toolchain in MSYS2",
                    gcc.display()
                ),
            ));
        }
        let perl = windows.msys2_perl();
        if !perl.exists() {
            return Err(precondition(
                "perl",
                format!("MSYS2 perl does not exist: {}", perl.display()),
            ));
        }

        let report = self.probe_perl(&perl.display().to_string())?;
        self.log.info(&format!(
            "mingw64 install verified, location: {}",
            mingw.display()
        ));
        Ok(VerifyOutcome {
            reports: vec![report],
            ndk_version: None,
        })
    }

    /// Android family: the NDK root for the configured version must
    /// exist; an unpinned version resolves to the newest installed one.
    fn verify_android(&self) -> Result<VerifyOutcome, EngineError> {
        let version = self.resolve_ndk_version()?;
        self.log.info(&format!("Android NDK verified, version: {version}"));
        Ok(VerifyOutcome {
            reports: vec![VerifyReport {
                component: "Android NDK".to_owned(),
                version: Some(version.clone()),
            }],
            ndk_version: Some(version),
        })
    }

    /// Linux/Apple families: perl for the OpenSSL Configure script, and
    /// an assembler unless assembly optimizations are disabled.
    fn verify_unix(&self) -> Result<VerifyOutcome, EngineError> {
        let mut reports = vec![self.probe_perl("perl")?];

        if self.config.openssl.asm_disabled() {
            self.log.status("no-asm specified in configure options, NASM not required");
        } else {
            reports.push(self.probe_nasm()?);
        }
        Ok(VerifyOutcome {
            reports,
            ndk_version: None,
        })
    }

    fn probe_perl(&self, program: &str) -> Result<VerifyReport, EngineError> {
        let response = self.probe(program, "perl")?;
        if !response.starts_with(PERL_RESPONSE_PREFIX) {
            return Err(precondition(
                "perl",
                format!(
                    "perl is required but does not seem to be on the path (response: {})",
                    first_line(&response)
                ),
            ));
        }
        let version = response
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .map(|(version, _)| version.to_owned());
        if let Some(v) = &version {
            self.log.info(&format!("perl found, version: {v}"));
        }
        Ok(VerifyReport {
            component: "perl".to_owned(),
            version,
        })
    }

    fn probe_nasm(&self) -> Result<VerifyReport, EngineError> {
        let response = self.probe("nasm", "NASM")?;
        let Some(rest) = response.strip_prefix(NASM_RESPONSE_PREFIX) else {
            return Err(precondition(
                "NASM",
                "NASM is required but does not seem to be on the path (www.nasm.us)".to_owned(),
            ));
        };
        let version = rest.split_whitespace().next().map(str::to_owned);
        if let Some(v) = &version {
            self.log.info(&format!("NASM found, version: {v}"));
        }
        Ok(VerifyReport {
            component: "NASM".to_owned(),
            version,
        })
    }

    /// Run `<program> --version` and return combined output (stderr is
    /// not an error channel for version probes; some tools report there).
    fn probe(&self, program: &str, component: &str) -> Result<String, EngineError> {
        let spec = CommandSpec::new(program).arg("--version");
        let output = self.runner.run(&spec).map_err(|e| {
            precondition(component, format!("cannot execute {program}: {e}"))
        })?;
        if output.stdout.is_empty() {
            Ok(output.stderr)
        } else {
            Ok(output.stdout)
        }
    }

    fn resolve_ndk_version(&self) -> Result<String, EngineError> {
        let android = &self.config.tools.android;
        let sdk = android.sdk_location(self.host);
        let ndk_dir = Path::new(sdk).join("ndk");
        if !ndk_dir.is_dir() {
            return Err(precondition(
                "Android NDK",
                format!("no NDK installs located in {}/ndk", sdk),
            ));
        }

        if !android.ndk_version.is_empty() {
            let versioned = ndk_dir.join(&android.ndk_version);
            if !versioned.is_dir() {
                return Err(precondition(
                    "Android NDK",
                    format!(
                        "version {} could not be located in {}/ndk",
                        android.ndk_version, sdk
                    ),
                ));
            }
            return Ok(android.ndk_version.clone());
        }

        // No pinned version: pick the lexicographically greatest install.
        let entries = std::fs::read_dir(&ndk_dir).map_err(|source| {
            EngineError::Util(cipherforge_util::error::UtilError::Io {
                path: ndk_dir.display().to_string(),
                source,
            })
        })?;
        let mut newest = String::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                EngineError::Util(cipherforge_util::error::UtilError::Io {
                    path: ndk_dir.display().to_string(),
                    source,
                })
            })?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if name > newest.as_str() {
                        newest = name.to_owned();
                    }
                }
            }
        }
        if newest.is_empty() {
            return Err(precondition(
                "Android NDK",
                format!("no NDK versions could be located in {}/ndk", sdk),
            ));
        }
        Ok(newest)
    }
}

fn precondition(component: &str, message: String) -> EngineError {
    EngineError::Precondition {
        component: component.to_owned(),
        message,
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use cipherforge_util::error::UtilError;
    use cipherforge_util::process::CommandOutput;

    use super::*;

    struct NullLog;
    impl BuildLog for NullLog {
        fn info(&self, _: &str) {}
        fn warn(&self, _: &str) {}
        fn error(&self, _: &str) {}
        fn status(&self, _: &str) {}
    }

    /// Maps program names to canned stdout.
    struct ToolStub {
        responses: BTreeMap<&'static str, &'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl ToolStub {
        fn new(responses: &[(&'static str, &'static str)]) -> Self {
            Self {
                responses: responses.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for ToolStub {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, UtilError> {
            self.calls.lock().unwrap().push(spec.program.clone());
            let stdout = self.responses.get(spec.program.as_str()).copied().unwrap_or("");
            Ok(CommandOutput {
                stdout: stdout.to_owned(),
                stderr: String::new(),
                success: true,
                exit_code: Some(0),
            })
        }
    }

    const PERL_OK: &str = "This is perl 5, version 34, subversion 0 (v5.34.0) built for x86_64-linux";
    const NASM_OK: &str = "NASM version 2.15.05 compiled on Sep 24 2020";

    #[test]
    fn linux_verify_probes_perl_and_skips_nasm_under_no_asm() {
        let config = BuildConfig::default(); // default configure options carry no-asm
        let runner = ToolStub::new(&[("perl", PERL_OK)]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let outcome = verifier.verify(TargetId::LinuxX64).unwrap();
        assert_eq!(outcome.reports.len(), 1);
        let perl = outcome.reports.first().unwrap();
        assert_eq!(perl.component, "perl");
        assert_eq!(perl.version.as_deref(), Some("v5.34.0"));
        assert_eq!(*runner.calls.lock().unwrap(), vec!["perl"]);
    }

    #[test]
    fn linux_verify_requires_nasm_when_asm_enabled() {
        let mut config = BuildConfig::default();
        config.openssl.configure_options = vec!["no-weak-ssl-ciphers".to_owned()];
        let runner = ToolStub::new(&[("perl", PERL_OK), ("nasm", NASM_OK)]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let outcome = verifier.verify(TargetId::LinuxX64).unwrap();
        assert_eq!(outcome.reports.len(), 2);
        let nasm = outcome.reports.get(1).unwrap();
        assert_eq!(nasm.component, "NASM");
        assert_eq!(nasm.version.as_deref(), Some("2.15.05"));
    }

    #[test]
    fn missing_nasm_is_a_precondition_error() {
        let mut config = BuildConfig::default();
        config.openssl.configure_options.clear();
        let runner = ToolStub::new(&[("perl", PERL_OK), ("nasm", "bash: nasm: not found")]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let err = verifier.verify(TargetId::MacosX64).unwrap_err();
        assert!(matches!(err, EngineError::Precondition { .. }));
        assert!(err.to_string().contains("NASM"));
    }

    #[test]
    fn garbled_perl_response_is_a_precondition_error() {
        let config = BuildConfig::default();
        let runner = ToolStub::new(&[("perl", "command not found")]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let err = verifier.verify(TargetId::LinuxX64).unwrap_err();
        assert!(err.to_string().contains("perl"));
    }

    #[test]
    fn android_pinned_version_must_exist() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("ndk").join("21.3.6528147")).unwrap();

        let mut config = BuildConfig::default();
        config.tools.android.linux_sdk_location = tmp.path().display().to_string();
        let runner = ToolStub::new(&[]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let outcome = verifier.verify(TargetId::AndroidArm64).unwrap();
        assert_eq!(outcome.ndk_version.as_deref(), Some("21.3.6528147"));

        // A version that is not installed fails, naming the location.
        let mut missing = config.clone();
        missing.tools.android.ndk_version = "25.0.0000000".to_owned();
        let verifier = Verifier {
            config: &missing,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };
        let err = verifier.verify(TargetId::AndroidArm64).unwrap_err();
        assert!(err.to_string().contains("25.0.0000000"));
    }

    #[test]
    fn android_unpinned_version_resolves_to_newest() {
        let tmp = tempfile::tempdir().unwrap();
        for version in ["21.3.6528147", "22.1.7171670", "22.0.7026061"] {
            std::fs::create_dir_all(tmp.path().join("ndk").join(version)).unwrap();
        }

        let mut config = BuildConfig::default();
        config.tools.android.linux_sdk_location = tmp.path().display().to_string();
        config.tools.android.ndk_version = String::new();
        let runner = ToolStub::new(&[]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Linux,
            runner: &runner,
            log: &log,
        };

        let outcome = verifier.verify(TargetId::AndroidX64).unwrap();
        assert_eq!(outcome.ndk_version.as_deref(), Some("22.1.7171670"));
    }

    #[test]
    fn msvc_verify_names_the_missing_bootstrap_file() {
        let config = BuildConfig::default(); // default VS path does not exist here
        let runner = ToolStub::new(&[]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Windows,
            runner: &runner,
            log: &log,
        };

        let err = verifier.verify(TargetId::VStudio64).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Visual Studio"));
        assert!(message.contains("vcvars64.bat"));
    }

    #[test]
    fn mingw_verify_requires_msys2_location() {
        let config = BuildConfig::default();
        let runner = ToolStub::new(&[]);
        let log = NullLog;
        let verifier = Verifier {
            config: &config,
            host: HostOs::Windows,
            runner: &runner,
            log: &log,
        };

        let err = verifier.verify(TargetId::MingwX64).unwrap_err();
        assert!(err.to_string().contains("msys2_install_directory"));
    }
}
