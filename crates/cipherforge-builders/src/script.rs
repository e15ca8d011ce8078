//! Generated build scripts: pure text generation, fixed-name writing,
//! and execution through the runner seam.
//!
//! Every generator here is a pure function `(inputs) -> script text`, so
//! identical inputs always produce identical scripts and content can be
//! unit-tested without spawning anything. Scripts are written under a
//! fixed `forge-` prefixed name and overwritten on each run, never
//! appended, so the last run's exact script is always on disk to inspect.

use std::path::{Path, PathBuf};

use cipherforge_config::tools::{WindowsTools, CMD_EXE};
use cipherforge_targets::HostOs;
use cipherforge_util::log::{report_output, BuildLog};
use cipherforge_util::process::{shell_script_spec, CommandOutput, CommandRunner, CommandSpec};

use crate::error::BuilderError;

/// Prefix on every generated file so they are recognizable (and cleanable)
/// next to the upstream source tree.
pub const SCRIPT_PREFIX: &str = "forge-";

/// Apply the generated-file prefix to a name.
pub fn generated_file_name(name: &str) -> String {
    format!("{SCRIPT_PREFIX}{name}")
}

/// The per-build, per-target base name: `<build>-<target>`.
pub fn build_file_stem(build_name: &str, target: &str) -> String {
    format!("{build_name}-{target}")
}

/// Write a generated script (or control file) into `dir` and mark it
/// executable. A pre-existing file with the same name is replaced.
///
/// Returns the file name written.
///
/// # Errors
/// Returns an error if the file cannot be written.
pub fn write_generated(dir: &Path, file_name: &str, content: &str) -> Result<String, BuilderError> {
    let path = dir.join(file_name);
    cipherforge_util::fs::remove_file_if_exists(&path)?;
    std::fs::write(&path, content).map_err(|source| {
        cipherforge_util::error::UtilError::Io {
            path: path.display().to_string(),
            source,
        }
    })?;
    cipherforge_util::fs::make_executable(&path)?;
    Ok(file_name.to_owned())
}

/// Run a prepared command, reporting its output (stderr first), and turn
/// a non-zero exit into [`BuilderError::ExecutionFailed`] carrying the
/// captured stderr verbatim.
///
/// # Errors
/// Returns an error if the command cannot be spawned or exits non-zero.
pub fn execute(
    runner: &dyn CommandRunner,
    log: &dyn BuildLog,
    spec: &CommandSpec,
    script: &str,
) -> Result<CommandOutput, BuilderError> {
    log.info(&format!("Starting command: {}", spec.command_line()));
    let output = runner.run(spec)?;
    report_output(log, &output);
    if !output.success {
        return Err(BuilderError::ExecutionFailed {
            script: script.to_owned(),
            code: output.exit_code,
            stderr: output.stderr,
            stdout: output.stdout,
        });
    }
    Ok(output)
}

/// Command spec for running a generated shell script.
///
/// On Windows hosts the script runs under MSYS2 bash (`env.exe` with the
/// MINGW64 environment and the MinGW bin directories on PATH); elsewhere
/// it is invoked directly in its directory.
pub fn shell_spec(
    host: HostOs,
    windows: &WindowsTools,
    dir: &Path,
    script_name: &str,
) -> CommandSpec {
    if host == HostOs::Windows {
        CommandSpec::new(windows.msys2_exec().display().to_string())
            .args([
                "MSYSTEM=MINGW64",
                "CHERE_INVOKING=1",
                "MSYS2_PATH_TYPE=inherit",
                "/usr/bin/bash",
                "-lc",
            ])
            .arg(format!("./{script_name}"))
            .current_dir(dir)
            .env("PATH", windows.mingw_bin_path())
    } else {
        shell_script_spec(dir, script_name)
    }
}

/// Command spec for running a generated `.bat` via `cmd.exe /c`.
pub fn cmd_spec(dir: &Path, bat_name: &str) -> CommandSpec {
    CommandSpec::new(CMD_EXE)
        .args(["/c", bat_name])
        .current_dir(dir)
}

/// Convert a Windows absolute path to its MSYS2 form (`C:\x` → `/c/x`).
///
/// Paths without a drive-letter prefix are returned forward-slashed as-is.
pub fn msys_path(path: &Path) -> String {
    let raw = path.display().to_string();
    let mut chars = raw.chars();
    let drive = chars.next();
    let colon = chars.next();
    match (drive, colon) {
        (Some(d), Some(':')) if d.is_ascii_alphabetic() => {
            let rest: String = chars.collect();
            format!("/{}{}", d.to_ascii_lowercase(), forward_slash(&rest))
        }
        _ => forward_slash(&raw),
    }
}

/// Replace backslashes with forward slashes for tools that want unix-style
/// paths on Windows.
pub fn forward_slash(path: &str) -> String {
    path.replace('\\', "/")
}

// --- OpenSSL script texts ---

/// Visual Studio OpenSSL build: bootstrap the VS environment, configure
/// with the Windows perl, then nmake.
pub fn openssl_msvc_script(vcvars: &str, configure_options: &str) -> String {
    format!(
        "call \"{vcvars}\"\n\
         perl.exe Configure VC-WIN64A {configure_options}\n\
         nmake\n"
    )
}

/// MinGW / Linux / macOS OpenSSL build: Configure for the host triple,
/// then make.
pub fn openssl_unix_script(configure_host: &str, configure_options: &str) -> String {
    format!(
        "#!/bin/sh\n\
         ./Configure {configure_host} {configure_options}\n\
         make all\n"
    )
}

/// Android OpenSSL build: export the NDK root and toolchain PATH, then
/// Configure for the Android arch and build the libraries only.
pub fn openssl_android_script(
    ndk_root: &str,
    ndk_bin_path: &str,
    configure_target: &str,
    minimum_sdk: u32,
    configure_options: &str,
) -> String {
    format!(
        "#!/bin/sh\n\
         export ANDROID_NDK_ROOT={ndk_root}\n\
         export PATH={ndk_bin_path}:$PATH\n\
         ./Configure {configure_target} -D_ANDROID_API={minimum_sdk} -D_FILE_OFFSET_BITS=64 {configure_options}\n\
         make build_libs\n"
    )
}

/// iOS OpenSSL build: clang from the Xcode toolchain against the platform
/// SDK sysroot, with the minimum-OS-version floor.
pub fn openssl_ios_script(
    platform: &str,
    toolchain_path: &str,
    configure_target: &str,
    configure_options: &str,
    cross_path: &str,
    minimum_version: &str,
) -> String {
    format!(
        "#!/bin/zsh\n\
         export PLATFORM={platform}\n\
         export CC=clang\n\
         export PATH=\"{toolchain_path}:$PATH\"\n\
         ./Configure {configure_target} {configure_options}-isysroot {cross_path}/SDKs/{platform}.sdk -miphoneos-version-min={minimum_version}\n\
         make all\n"
    )
}

// --- SQLCipher script texts ---

/// nmake options file for the Visual Studio SQLCipher build. Driving
/// nmake through an options file sidesteps cmd.exe command-line length
/// limits.
pub fn sqlcipher_nmake_options(
    sdk_lib_path: &str,
    compiler_options: &str,
    openssl_lib_dir: &str,
    module_name: &str,
) -> String {
    format!(
        "FOR_WIN10=1\n\
         PLATFORM=x64\n\
         USE_NATIVE_LIBPATHS=1\n\
         NCRTLIBPATH=\"{sdk_lib_path}\\ucrt\\x64\"\n\
         NSDKLIBPATH=\"{sdk_lib_path}\\um\\x64\"\n\
         LTLIBS=\"Advapi32.lib User32.lib kernel32.lib\"\n\
         CCOPTS=\"{compiler_options}\"\n\
         SHELL_CORE_LIB=lib{module_name}.lib\n\
         LDFLAGS={openssl_lib_dir}\\libcrypto_static.lib\n"
    )
}

/// Visual Studio SQLCipher build: bootstrap the VS environment, then
/// nmake with the generated options file.
pub fn sqlcipher_msvc_script(vcvars: &str, nmake_options_file: &str) -> String {
    format!(
        "call \"{vcvars}\"\n\
         nmake /f Makefile.msc @{nmake_options_file}\n"
    )
}

/// MinGW / Linux SQLCipher build.
///
/// `link_math` adds `-lm`: Linux builds with FTS5 enabled fail to link
/// without the math library; MinGW does not need it.
pub fn sqlcipher_autotools_script(
    build_option: &str,
    openssl_include: &str,
    openssl_lib: &str,
    compiler_options: &str,
    link_math: bool,
) -> String {
    let build = if build_option.is_empty() {
        String::new()
    } else {
        format!("{build_option} ")
    };
    let math = if link_math { " -lm" } else { "" };
    format!(
        "#!/bin/sh\n\
         ./configure {build}--enable-tempstore=yes --disable-tcl --enable-static=yes --with-crypto-lib=none LDFLAGS=\"-L{openssl_lib} -lcrypto{math}\" CFLAGS=\"{compiler_options}-I{openssl_include}\"\n\
         make\n"
    )
}

/// Amalgamation generation: configure the SQLCipher tree, then make only
/// the single-file translation unit.
pub fn amalgamation_script(build_option: &str, compiler_options: &str, amalgamation: &str) -> String {
    let build = if build_option.is_empty() {
        String::new()
    } else {
        format!("--build={build_option} ")
    };
    format!(
        "#!/bin/sh\n\
         ./configure {build}--enable-tempstore=yes --disable-tcl --with-crypto-lib=none CFLAGS=\"{compiler_options}\"\n\
         make {amalgamation}\n"
    )
}

/// Apple SQLCipher build: compile the amalgamation with clang against the
/// platform SDK, then archive it into a static library with libtool.
pub fn sqlcipher_apple_script(
    toolchain_path: &str,
    clang_options: &str,
    object_name: &str,
    amalgamation: &str,
    library_name: &str,
) -> String {
    format!(
        "#!/bin/zsh\n\
         export PATH=\"{toolchain_path}:$PATH\"\n\
         clang {clang_options} -o {object_name} -c {amalgamation}\n\
         libtool -static -o {library_name} {object_name}\n"
    )
}

/// `Application.mk` for ndk-build: project, ABI, platform, and module
/// declarations.
pub fn android_application_mk(vars: &[(&str, String)]) -> String {
    let mut content = String::new();
    for (key, value) in vars {
        content.push_str(&format!("{key} := {value}\n"));
    }
    content
}

/// `Android.mk` for ndk-build: the libsqlcipher shared module built from
/// the amalgamation, linking the prebuilt OpenSSL static library.
pub fn android_android_mk(
    cflags: &str,
    amalgamation: &str,
    ldflags: &str,
    openssl_include: &str,
    openssl_lib: &str,
) -> String {
    format!(
        "LOCAL_PATH := $(call my-dir)\n\
         include $(CLEAR_VARS)\n\
         LOCAL_MODULE := libsqlcipher\n\
         LOCAL_C_INCLUDES += $(LOCAL_PATH)\n\
         LOCAL_CFLAGS += {cflags}\n\
         LOCAL_SRC_FILES := {amalgamation}\n\
         {ldflags}\n\
         LOCAL_STATIC_LIBRARIES += libcrypto\n\
         include $(BUILD_SHARED_LIBRARY)\n\
         include $(CLEAR_VARS)\n\
         LOCAL_MODULE := libcrypto\n\
         LOCAL_EXPORT_C_INCLUDES := {openssl_include}\n\
         LOCAL_SRC_FILES := {openssl_lib}/libcrypto.a\n\
         include $(PREBUILT_STATIC_LIBRARY)\n"
    )
}

/// Shell wrapper invoking ndk-build with the generated control files.
pub fn android_ndk_build_script(ndk_root: &str, ndk_bin_path: &str, command_line: &str) -> String {
    format!(
        "#!/bin/sh\n\
         export ANDROID_NDK_ROOT={ndk_root}\n\
         export PATH={ndk_bin_path}:$PATH\n\
         {command_line}\n"
    )
}
