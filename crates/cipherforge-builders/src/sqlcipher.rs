//! SQLCipher build dispatch, one strategy per toolchain family.
//!
//! Every strategy links against the OpenSSL built earlier in the same
//! target's pipeline: the include directory comes from the OpenSSL source
//! tree, the library directory from its collected artifacts.

use std::path::Path;

use cipherforge_config::manifest::{SqlcipherSection, MODULE_HEADER, MODULE_NAME};
use cipherforge_config::options::options_string;
use cipherforge_config::tools::AndroidTools;
use cipherforge_targets::{descriptor, ToolchainFamily};

use crate::android::build_android_sqlcipher;
use crate::apple::build_apple_sqlcipher;
use crate::error::BuilderError;
use crate::script::{
    build_file_stem, cmd_spec, execute, generated_file_name, msys_path, shell_spec,
    sqlcipher_autotools_script, sqlcipher_msvc_script, sqlcipher_nmake_options, write_generated,
};
use crate::{BuildContext, BuildProducts, CollectSpec, WINDOWS_PATTERNS};

/// Build SQLCipher in `src_dir`, linking against the OpenSSL products.
///
/// # Errors
/// Returns an error if script generation fails or the build exits
/// non-zero; the error carries the captured stderr verbatim.
pub fn build_sqlcipher(
    ctx: &BuildContext<'_>,
    android: &AndroidTools,
    src_dir: &Path,
    openssl_include: &Path,
    openssl_lib: &Path,
) -> Result<BuildProducts, BuilderError> {
    match descriptor(ctx.target).toolchain {
        ToolchainFamily::Msvc => msvc_build(ctx, src_dir, openssl_include, openssl_lib),
        ToolchainFamily::Mingw => autotools_build(
            ctx,
            src_dir,
            "--build=mingw64",
            &msys_path(openssl_include),
            &msys_path(openssl_lib),
            false,
        ),
        ToolchainFamily::LinuxGnu => autotools_build(
            ctx,
            src_dir,
            "",
            &openssl_include.display().to_string(),
            &openssl_lib.display().to_string(),
            true,
        ),
        ToolchainFamily::AndroidNdk => {
            build_android_sqlcipher(ctx, android, src_dir, openssl_include, openssl_lib)
        }
        ToolchainFamily::AppleClang => build_apple_sqlcipher(ctx, src_dir, openssl_include),
    }
}

/// Visual Studio build: nmake driven by a generated options file, linking
/// the prebuilt static libcrypto.
fn msvc_build(
    ctx: &BuildContext<'_>,
    src_dir: &Path,
    openssl_include: &Path,
    openssl_lib: &Path,
) -> Result<BuildProducts, BuilderError> {
    let windows = &ctx.config.tools.windows;
    let options = options_string(&ctx.config.options.merged_for(ctx.target));
    let win_options = format!("-guard:cf {options}-I{}", openssl_include.display());

    let nmake_file_name = generated_file_name("nmakeCmdFile.txt");
    let nmake_content = sqlcipher_nmake_options(
        &windows.sdk_lib_path().display().to_string(),
        &win_options,
        &openssl_lib.display().to_string(),
        MODULE_NAME,
    );
    write_generated(src_dir, &nmake_file_name, &nmake_content)?;

    let bat_name = generated_file_name(&format!(
        "{}.bat",
        build_file_stem(SqlcipherSection::BUILD_NAME, ctx.target.as_str())
    ));
    let bat = sqlcipher_msvc_script(
        &windows.vstudio_env_file().display().to_string(),
        &nmake_file_name,
    );
    write_generated(src_dir, &bat_name, &bat)?;

    ctx.log.status(&format!("{bat_name} compilerOptions: {win_options}"));
    let output = execute(ctx.runner, ctx.log, &cmd_spec(src_dir, &bat_name), &bat_name)?;

    let mut patterns = WINDOWS_PATTERNS.to_vec();
    patterns.push(MODULE_HEADER);
    Ok(BuildProducts {
        collects: vec![CollectSpec::new(src_dir.to_path_buf(), &patterns)],
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// MinGW / Linux build via the project's configure script and make.
fn autotools_build(
    ctx: &BuildContext<'_>,
    src_dir: &Path,
    build_option: &str,
    openssl_include: &str,
    openssl_lib: &str,
    link_math: bool,
) -> Result<BuildProducts, BuilderError> {
    let options = options_string(&ctx.config.options.merged_for(ctx.target));
    let script_name = generated_file_name(&format!(
        "{}.sh",
        build_file_stem(SqlcipherSection::BUILD_NAME, ctx.target.as_str())
    ));
    let script = sqlcipher_autotools_script(
        build_option,
        openssl_include,
        openssl_lib,
        &options,
        link_math,
    );
    write_generated(src_dir, &script_name, &script)?;

    ctx.log.status(&format!("{script_name} compilerOptions: {options}"));
    let spec = shell_spec(ctx.host, &ctx.config.tools.windows, src_dir, &script_name);
    let output = execute(ctx.runner, ctx.log, &spec, &script_name)?;

    // Libtool puts the built libraries under .libs; the module header and
    // the sqlcipher shell live at the tree root.
    Ok(BuildProducts {
        collects: vec![
            CollectSpec::all(src_dir.join(".libs")),
            CollectSpec::new(src_dir.to_path_buf(), &[MODULE_HEADER, MODULE_NAME]),
        ],
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use cipherforge_config::BuildConfig;
    use cipherforge_targets::{HostOs, TargetId};
    use cipherforge_util::error::UtilError;
    use cipherforge_util::log::BuildLog;
    use cipherforge_util::process::{CommandOutput, CommandRunner, CommandSpec};

    use super::*;

    struct NullLog;
    impl BuildLog for NullLog {
        fn info(&self, _: &str) {}
        fn warn(&self, _: &str) {}
        fn error(&self, _: &str) {}
        fn status(&self, _: &str) {}
    }

    #[derive(Default)]
    struct StubRunner {
        specs: Mutex<Vec<CommandSpec>>,
        stderr: Option<&'static str>,
    }

    impl CommandRunner for StubRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, UtilError> {
            self.specs.lock().unwrap().push(spec.clone());
            match self.stderr {
                Some(stderr) => Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: stderr.to_owned(),
                    success: false,
                    exit_code: Some(1),
                }),
                None => Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: String::new(),
                    success: true,
                    exit_code: Some(0),
                }),
            }
        }
    }

    fn linux_ctx<'a>(
        config: &'a BuildConfig,
        runner: &'a StubRunner,
        log: &'a NullLog,
    ) -> BuildContext<'a> {
        BuildContext {
            target: TargetId::LinuxX64,
            host: HostOs::Linux,
            config,
            runner,
            log,
        }
    }

    #[test]
    fn linux_build_links_crypto_and_math() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfig::default();
        let runner = StubRunner::default();
        let log = NullLog;
        let ctx = linux_ctx(&config, &runner, &log);

        let products = build_sqlcipher(
            &ctx,
            &config.tools.android,
            tmp.path(),
            Path::new("/ssl/include"),
            Path::new("/out/openssl"),
        )
        .unwrap();

        let script =
            std::fs::read_to_string(tmp.path().join("forge-sqlcipher-linuxX64.sh")).unwrap();
        assert!(script.contains("LDFLAGS=\"-L/out/openssl -lcrypto -lm\""));
        assert!(script.contains("-I/ssl/include\""));
        assert!(script.contains("--with-crypto-lib=none"));

        // Collect from .libs (everything) plus the module header and shell.
        assert_eq!(products.collects.len(), 2);
        assert_eq!(products.collects.first().unwrap().from, tmp.path().join(".libs"));
        assert!(products.collects.first().unwrap().patterns.is_empty());
    }

    #[test]
    fn failing_build_carries_stderr_in_error_message() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfig::default();
        let runner = StubRunner {
            specs: Mutex::new(Vec::new()),
            stderr: Some("undefined reference to `SHA256_Init'"),
        };
        let log = NullLog;
        let ctx = linux_ctx(&config, &runner, &log);

        let err = build_sqlcipher(
            &ctx,
            &config.tools.android,
            tmp.path(),
            Path::new("/ssl/include"),
            Path::new("/out/openssl"),
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("undefined reference to `SHA256_Init'"));
    }

    #[test]
    fn msvc_build_writes_options_file_to_dodge_line_limits() {
        let tmp = tempfile::tempdir().unwrap();
        let config = BuildConfig::default();
        let runner = StubRunner::default();
        let log = NullLog;
        let ctx = BuildContext {
            target: TargetId::VStudio64,
            host: HostOs::Windows,
            config: &config,
            runner: &runner,
            log: &log,
        };

        build_sqlcipher(
            &ctx,
            &config.tools.android,
            tmp.path(),
            Path::new("C:\\ssl\\include"),
            Path::new("C:\\out\\openssl"),
        )
        .unwrap();

        let nmake = std::fs::read_to_string(tmp.path().join("forge-nmakeCmdFile.txt")).unwrap();
        assert!(nmake.contains("CCOPTS=\"-guard:cf "));
        assert!(nmake.contains("libcrypto_static.lib"));

        let bat = std::fs::read_to_string(tmp.path().join("forge-sqlcipher-vStudio64.bat")).unwrap();
        assert!(bat.contains("nmake /f Makefile.msc @forge-nmakeCmdFile.txt"));

        let specs = runner.specs.lock().unwrap();
        assert_eq!(specs.first().unwrap().program, "cmd.exe");
    }

    #[test]
    fn android_build_generates_ndk_control_files() {
        let tmp = tempfile::tempdir().unwrap();
        // Pre-seed the amalgamation so only ndk-build runs.
        std::fs::write(tmp.path().join("sqlite3.c"), "/* tu */").unwrap();

        let mut config = BuildConfig::default();
        config.tools.android.linux_sdk_location = "/opt/android-sdk".to_owned();
        let runner = StubRunner::default();
        let log = NullLog;
        let ctx = BuildContext {
            target: TargetId::AndroidArm64,
            host: HostOs::Linux,
            config: &config,
            runner: &runner,
            log: &log,
        };

        let products = build_sqlcipher(
            &ctx,
            &config.tools.android,
            tmp.path(),
            Path::new("/src/openssl/include"),
            Path::new("/out/openssl"),
        )
        .unwrap();

        let app_mk = std::fs::read_to_string(tmp.path().join("forge-Application.mk")).unwrap();
        assert!(app_mk.contains("APP_ABI := arm64-v8a"));
        assert!(app_mk.contains("APP_PLATFORM := android-23"));
        assert!(app_mk.contains("APP_MODULES := libcrypto libsqlcipher"));

        let android_mk = std::fs::read_to_string(tmp.path().join("forge-Android.mk")).unwrap();
        assert!(android_mk.contains("LOCAL_SRC_FILES := /out/openssl/libcrypto.a"));
        // Default NDK 21 still needs the bfd linker.
        assert!(android_mk.contains("-fuse-ld=bfd"));

        let script =
            std::fs::read_to_string(tmp.path().join("forge-sqlcipher-androidArm64.sh")).unwrap();
        assert!(script.contains("/opt/android-sdk/ndk/21.3.6528147/ndk-build"));
        assert!(script.contains("NDK_DEBUG=0"));

        assert_eq!(
            products.collects.first().unwrap().from,
            tmp.path().join("libs").join("arm64-v8a")
        );
    }

    #[test]
    fn android_r22_drops_bfd_linker_flag() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("sqlite3.c"), "/* tu */").unwrap();

        let mut config = BuildConfig::default();
        config.tools.android.linux_sdk_location = "/opt/android-sdk".to_owned();
        config.tools.android.ndk_version = "22.1.7171670".to_owned();
        let runner = StubRunner::default();
        let log = NullLog;
        let ctx = BuildContext {
            target: TargetId::AndroidX64,
            host: HostOs::Linux,
            config: &config,
            runner: &runner,
            log: &log,
        };

        build_sqlcipher(
            &ctx,
            &config.tools.android,
            tmp.path(),
            Path::new("/src/openssl/include"),
            Path::new("/out/openssl"),
        )
        .unwrap();

        let android_mk = std::fs::read_to_string(tmp.path().join("forge-Android.mk")).unwrap();
        assert!(!android_mk.contains("-fuse-ld=bfd"));
    }
}
