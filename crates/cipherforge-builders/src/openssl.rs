//! OpenSSL build dispatch, one strategy per toolchain family.

use std::path::Path;

use cipherforge_config::manifest::OpensslSection;
use cipherforge_config::options::options_string;
use cipherforge_targets::{descriptor, TargetId, ToolchainFamily};

use crate::android::{ndk_bin_path, ndk_root_for_script};
use crate::error::BuilderError;
use crate::script::{
    build_file_stem, cmd_spec, execute, generated_file_name, openssl_android_script,
    openssl_ios_script, openssl_msvc_script, openssl_unix_script, shell_spec, write_generated,
};
use crate::{
    BuildContext, BuildProducts, CollectSpec, APPLE_PATTERNS, LINUX_PATTERNS, MINGW_PATTERNS,
    WINDOWS_PATTERNS,
};

/// OpenSSL Configure target for Android NDK builds.
///
/// # Errors
/// Returns an error for non-Android targets.
fn android_configure_target(target: TargetId) -> Result<&'static str, BuilderError> {
    // Use `./Configure LIST` in an OpenSSL tree to see the valid names.
    match target {
        TargetId::AndroidArm64 => Ok("android-arm64"),
        TargetId::AndroidX64 => Ok("android64-x86_64"),
        _ => Err(BuilderError::WrongFamily {
            target: target.to_string(),
            family: "Android NDK",
        }),
    }
}

/// iOS platform name and Configure target.
fn ios_platform(target: TargetId) -> Result<(&'static str, &'static str), BuilderError> {
    match target {
        TargetId::IosX64 => Ok(("iPhoneSimulator", "iossimulator-xcrun")),
        TargetId::IosArm64 => Ok(("iPhoneOS", "ios64-cross")),
        _ => Err(BuilderError::WrongFamily {
            target: target.to_string(),
            family: "Apple clang",
        }),
    }
}

/// Build OpenSSL in `src_dir` for the context's target.
///
/// Generates the family's build script, runs it, and returns the
/// family-specific artifact patterns to collect from the compile tree
/// (plus the `test/` subdirectory products, kept under `test/`).
///
/// # Errors
/// Returns an error if the script cannot be written or exits non-zero.
pub fn build_openssl(ctx: &BuildContext<'_>, src_dir: &Path) -> Result<BuildProducts, BuilderError> {
    let options = options_string(&ctx.config.openssl.configure_options_for(ctx.target));
    let stem = build_file_stem(OpensslSection::BUILD_NAME, ctx.target.as_str());
    let windows = &ctx.config.tools.windows;

    let (output, patterns): (_, Vec<&str>) = match descriptor(ctx.target).toolchain {
        ToolchainFamily::Msvc => {
            let bat_name = generated_file_name(&format!("{stem}.bat"));
            let script = openssl_msvc_script(
                &windows.vstudio_env_file().display().to_string(),
                &options,
            );
            write_generated(src_dir, &bat_name, &script)?;
            let output = execute(ctx.runner, ctx.log, &cmd_spec(src_dir, &bat_name), &bat_name)?;
            (output, WINDOWS_PATTERNS.to_vec())
        }
        ToolchainFamily::Mingw => {
            let output = run_unix_configure(ctx, src_dir, &stem, "mingw64", &options)?;
            (output, MINGW_PATTERNS.to_vec())
        }
        ToolchainFamily::LinuxGnu => {
            let output = run_unix_configure(ctx, src_dir, &stem, "linux-x86_64", &options)?;
            (output, LINUX_PATTERNS.to_vec())
        }
        ToolchainFamily::AndroidNdk => {
            let android = &ctx.config.tools.android;
            let ndk_root = android.ndk_root(ctx.host);
            let script_name = generated_file_name(&format!("{stem}.sh"));
            let script = openssl_android_script(
                &ndk_root_for_script(&ndk_root, ctx.host),
                &ndk_bin_path(&ndk_root, ctx.host, ctx.target)?,
                android_configure_target(ctx.target)?,
                android.minimum_sdk,
                &options,
            );
            write_generated(src_dir, &script_name, &script)?;
            let spec = shell_spec(ctx.host, windows, src_dir, &script_name);
            let output = execute(ctx.runner, ctx.log, &spec, &script_name)?;
            (output, LINUX_PATTERNS.to_vec())
        }
        ToolchainFamily::AppleClang => {
            if ctx.target == TargetId::MacosX64 {
                let output =
                    run_unix_configure(ctx, src_dir, &stem, "darwin64-x86_64-cc", &options)?;
                let mut patterns = APPLE_PATTERNS.to_vec();
                patterns.push("*.dylib");
                (output, patterns)
            } else {
                let apple = &ctx.config.tools.apple;
                let (platform, configure_target) = ios_platform(ctx.target)?;
                let script_name = generated_file_name(&format!("{stem}.sh"));
                let script = openssl_ios_script(
                    platform,
                    &apple.toolchain_path(),
                    configure_target,
                    &options,
                    &apple.cross_path(platform),
                    &apple.sdk_version_minimum,
                );
                write_generated(src_dir, &script_name, &script)?;
                let spec = shell_spec(ctx.host, windows, src_dir, &script_name);
                let output = execute(ctx.runner, ctx.log, &spec, &script_name)?;
                (output, APPLE_PATTERNS.to_vec())
            }
        }
    };

    ctx.log.info(&format!(
        "intermediate and final build products are in {}",
        src_dir.display()
    ));

    Ok(BuildProducts {
        collects: vec![
            CollectSpec::new(src_dir.to_path_buf(), &patterns),
            CollectSpec::new(src_dir.join("test"), &patterns).into_subdir("test"),
        ],
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

fn run_unix_configure(
    ctx: &BuildContext<'_>,
    src_dir: &Path,
    stem: &str,
    configure_host: &str,
    options: &str,
) -> Result<cipherforge_util::process::CommandOutput, BuilderError> {
    let script_name = generated_file_name(&format!("{stem}.sh"));
    let script = openssl_unix_script(configure_host, options);
    write_generated(src_dir, &script_name, &script)?;
    let spec = shell_spec(ctx.host, &ctx.config.tools.windows, src_dir, &script_name);
    execute(ctx.runner, ctx.log, &spec, &script_name)
}
