//! Apple SQLCipher build: clang against the platform SDK, then libtool.

use std::path::Path;

use cipherforge_config::manifest::{AMALGAMATION, MODULE_HEADER, MODULE_NAME};
use cipherforge_targets::TargetId;

use crate::amalgamation::ensure_amalgamation;
use crate::error::BuilderError;
use crate::script::{
    build_file_stem, execute, generated_file_name, shell_spec, sqlcipher_apple_script,
    write_generated,
};
use crate::{BuildContext, BuildProducts, CollectSpec, APPLE_PATTERNS};

/// The static library the Apple build produces.
pub const LIBRARY_NAME: &str = "libsqlcipher.a";

/// Build SQLCipher for a macOS/iOS target by compiling the amalgamation
/// directly with clang and archiving it with libtool.
///
/// # Errors
/// Returns an error if the amalgamation cannot be produced, the script
/// fails, or the library is missing afterwards.
pub fn build_apple_sqlcipher(
    ctx: &BuildContext<'_>,
    src_dir: &Path,
    openssl_include: &Path,
) -> Result<BuildProducts, BuilderError> {
    ensure_amalgamation(ctx, src_dir)?;

    let apple = &ctx.config.tools.apple;
    let mut options = String::new();
    if ctx.target == TargetId::IosArm64 {
        options.push_str("-arch arm64 ");
    }
    for option in ctx.config.options.merged_for(ctx.target) {
        options.push_str(&option);
        options.push(' ');
    }
    for option in apple.sdk_options(ctx.target) {
        options.push_str(&option);
        options.push(' ');
    }
    options.push_str(&format!("-I. -I{} -fPIC -O3", openssl_include.display()));

    let object_name = format!("{MODULE_NAME}.o");
    let script_name = generated_file_name(&format!(
        "{}.sh",
        build_file_stem(
            cipherforge_config::manifest::SqlcipherSection::BUILD_NAME,
            ctx.target.as_str()
        )
    ));
    ctx.log
        .status(&format!("{script_name} compilerOptions: {options}"));
    let script = sqlcipher_apple_script(
        &apple.toolchain_path(),
        &options,
        &object_name,
        AMALGAMATION,
        LIBRARY_NAME,
    );
    write_generated(src_dir, &script_name, &script)?;

    let spec = shell_spec(ctx.host, &ctx.config.tools.windows, src_dir, &script_name);
    let output = execute(ctx.runner, ctx.log, &spec, &script_name)?;

    if !src_dir.join(LIBRARY_NAME).exists() {
        return Err(BuilderError::ProductMissing {
            path: src_dir.join(LIBRARY_NAME).display().to_string(),
            output: output.stdout,
        });
    }

    Ok(BuildProducts {
        collects: vec![
            CollectSpec::new(src_dir.to_path_buf(), APPLE_PATTERNS),
            CollectSpec::new(src_dir.to_path_buf(), &[MODULE_HEADER]),
        ],
        stdout: output.stdout,
        stderr: output.stderr,
    })
}
