//! Android NDK support: toolchain paths and the ndk-build SQLCipher build.

use std::path::{Path, PathBuf};

use cipherforge_config::manifest::MODULE_HEADER;
use cipherforge_config::tools::{AndroidTools, CMD_EXE};
use cipherforge_targets::{android_abi, HostOs, TargetId};
use cipherforge_util::process::CommandSpec;

use crate::amalgamation::ensure_amalgamation;
use crate::error::BuilderError;
use crate::script::{
    android_android_mk, android_application_mk, android_ndk_build_script, build_file_stem,
    execute, forward_slash, generated_file_name, msys_path, shell_spec, write_generated,
};
use crate::{BuildContext, BuildProducts, CollectSpec};

/// Compiler flags every Android SQLCipher build carries, ahead of the
/// configured options.
const REQUIRED_CFLAGS: &[&str] = &["-DLOG_NDEBUG", "-fstack-protector-all"];

/// NDK prebuilt toolchain directory name for the build host.
pub fn ndk_tools_dir(host: HostOs) -> &'static str {
    match host {
        HostOs::Windows => "windows-x86_64",
        HostOs::Linux => "linux-x86_64",
        HostOs::Mac => "darwin-x86_64",
    }
}

/// The Android target triple for an NDK target.
///
/// # Errors
/// Returns an error for non-Android targets.
pub fn ndk_triple(target: TargetId) -> Result<&'static str, BuilderError> {
    match target {
        TargetId::AndroidArm64 => Ok("aarch64-linux-android"),
        TargetId::AndroidX64 => Ok("x86_64-linux-android"),
        _ => Err(BuilderError::WrongFamily {
            target: target.to_string(),
            family: "Android NDK",
        }),
    }
}

/// The LLVM prebuilt root inside an NDK install.
pub fn ndk_prebuilt(ndk_root: &Path, host: HostOs) -> PathBuf {
    ndk_root
        .join("toolchains")
        .join("llvm")
        .join("prebuilt")
        .join(ndk_tools_dir(host))
}

/// PATH prefix the generated scripts export: the prebuilt `bin` plus the
/// per-triple `bin`. Scripts run under a POSIX shell on every host (MSYS2
/// bash on Windows), so entries are msys-converted there and joined with
/// `:` everywhere.
///
/// # Errors
/// Returns an error for non-Android targets.
pub fn ndk_bin_path(
    ndk_root: &Path,
    host: HostOs,
    target: TargetId,
) -> Result<String, BuilderError> {
    let prebuilt = ndk_prebuilt(ndk_root, host);
    let bins = [
        prebuilt.join("bin"),
        prebuilt.join(ndk_triple(target)?).join("bin"),
    ];
    let rendered: Vec<String> = bins
        .iter()
        .map(|p| {
            if host == HostOs::Windows {
                msys_path(p)
            } else {
                p.display().to_string()
            }
        })
        .collect();
    Ok(rendered.join(":"))
}

/// The ndk-build entry point for the host.
pub fn ndk_build_command(ndk_root: &Path, host: HostOs) -> PathBuf {
    if host == HostOs::Windows {
        ndk_root.join("ndk-build.cmd")
    } else {
        ndk_root.join("ndk-build")
    }
}

/// The NDK root rendered the way generated scripts consume it.
pub fn ndk_root_for_script(ndk_root: &Path, host: HostOs) -> String {
    if host == HostOs::Windows {
        msys_path(ndk_root)
    } else {
        ndk_root.display().to_string()
    }
}

/// Build SQLCipher for an Android target with ndk-build.
///
/// Generates the two ndk-build control files (`Application.mk` variables
/// and the `Android.mk` module list with the prebuilt OpenSSL static
/// dependency), then invokes the NDK's cross build tool. The shared
/// library lands in `libs/<abi>/`.
///
/// # Errors
/// Returns an error if the amalgamation cannot be produced, a control
/// file cannot be written, or ndk-build exits non-zero.
pub fn build_android_sqlcipher(
    ctx: &BuildContext<'_>,
    android: &AndroidTools,
    src_dir: &Path,
    openssl_include: &Path,
    openssl_lib: &Path,
) -> Result<BuildProducts, BuilderError> {
    let abi = android_abi(ctx.target).ok_or(BuilderError::WrongFamily {
        target: ctx.target.to_string(),
        family: "Android NDK",
    })?;

    ensure_amalgamation(ctx, src_dir)?;

    let mut cflags = String::new();
    for flag in REQUIRED_CFLAGS {
        cflags.push_str(flag);
        cflags.push(' ');
    }
    cflags.push_str(&cipherforge_config::options::options_string(
        &ctx.config.options.merged_for(ctx.target),
    ));

    let app_mk_name = generated_file_name("Application.mk");
    let android_mk_name = generated_file_name("Android.mk");

    let app_mk = android_application_mk(&[
        ("APP_PROJECT_PATH", forward_slash(&src_dir.display().to_string())),
        ("APP_ABI", abi.to_owned()),
        (
            "APP_BUILD_SCRIPT",
            forward_slash(&src_dir.join(&android_mk_name).display().to_string()),
        ),
        ("APP_CFLAGS", "-D_FILE_OFFSET_BITS=64".to_owned()),
        ("APP_LDFLAGS", "-Wl,--exclude-libs,ALL".to_owned()),
        ("APP_PLATFORM", format!("android-{}", android.minimum_sdk)),
        ("APP_MODULES", "libcrypto libsqlcipher".to_owned()),
    ]);
    write_generated(src_dir, &app_mk_name, &app_mk)?;

    // -fuse-ld=bfd is only needed for NDK r21 and earlier.
    let lib_dir = forward_slash(&openssl_lib.display().to_string());
    let ldflags = if android.r22_or_later()? {
        format!("LOCAL_LDFLAGS += -L{lib_dir}")
    } else {
        format!("LOCAL_LDFLAGS += -L{lib_dir} -fuse-ld=bfd")
    };
    let android_mk = android_android_mk(
        &cflags,
        cipherforge_config::manifest::AMALGAMATION,
        &ldflags,
        &forward_slash(&openssl_include.display().to_string()),
        &lib_dir,
    );
    write_generated(src_dir, &android_mk_name, &android_mk)?;

    let ndk_root = android.ndk_root(ctx.host);
    let build_cmd = ndk_build_command(&ndk_root, ctx.host);
    let ndk_options = [
        "V=1".to_owned(),
        "NDK_DEBUG=0".to_owned(),
        format!(
            "NDK_APPLICATION_MK={}",
            forward_slash(&src_dir.join(&app_mk_name).display().to_string())
        ),
        format!(
            "NDK_PROJECT_PATH={}",
            forward_slash(&src_dir.display().to_string())
        ),
        "all".to_owned(),
    ];

    let output = if ctx.host == HostOs::Windows {
        let spec = CommandSpec::new(CMD_EXE)
            .args(["/c", &build_cmd.display().to_string()])
            .args(ndk_options.iter().cloned())
            .current_dir(src_dir);
        execute(ctx.runner, ctx.log, &spec, &build_cmd.display().to_string())?
    } else {
        let mut command_line = build_cmd.display().to_string();
        for option in &ndk_options {
            command_line.push(' ');
            command_line.push_str(option);
        }
        let script_name = generated_file_name(&format!(
            "{}.sh",
            build_file_stem(cipherforge_config::manifest::SqlcipherSection::BUILD_NAME, ctx.target.as_str())
        ));
        let script = android_ndk_build_script(
            &ndk_root_for_script(&ndk_root, ctx.host),
            &ndk_bin_path(&ndk_root, ctx.host, ctx.target)?,
            &command_line,
        );
        write_generated(src_dir, &script_name, &script)?;
        let spec = shell_spec(ctx.host, &ctx.config.tools.windows, src_dir, &script_name);
        execute(ctx.runner, ctx.log, &spec, &script_name)?
    };

    let output_dir = src_dir.join("libs").join(abi);
    Ok(BuildProducts {
        collects: vec![
            CollectSpec::new(output_dir, &["*.so"]),
            CollectSpec::new(src_dir.to_path_buf(), &[MODULE_HEADER]),
        ],
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
