//! The shared amalgamation pre-step for Android and Apple builds.

use std::path::Path;

use cipherforge_config::manifest::AMALGAMATION;
use cipherforge_config::options::options_string;
use cipherforge_targets::TargetId;

use crate::error::BuilderError;
use crate::script::{amalgamation_script, execute, generated_file_name, shell_spec, write_generated};
use crate::BuildContext;

/// `--build=` value the SQLCipher configure script needs when generating
/// the amalgamation for a cross target. Empty for host-native configures.
pub fn amalgamation_build_option(target: TargetId) -> &'static str {
    match target {
        TargetId::AndroidArm64 => "aarch64-linux",
        TargetId::AndroidX64 => "x86_64-linux",
        _ => "",
    }
}

/// Reduce the SQLCipher multi-file source into the single `sqlite3.c`
/// translation unit via the project's own configure + make.
///
/// Skipped when the amalgamation already exists in `src_dir`, the same
/// idempotency discipline as source acquisition, so re-runs are cheap.
///
/// # Errors
/// Returns an error if the generation script fails or the translation
/// unit is still missing afterwards.
pub fn ensure_amalgamation(ctx: &BuildContext<'_>, src_dir: &Path) -> Result<(), BuilderError> {
    let amalgamation = src_dir.join(AMALGAMATION);
    if amalgamation.exists() {
        ctx.log.info(&format!(
            "amalgamation {AMALGAMATION} already present, skipping generation"
        ));
        return Ok(());
    }

    let options = options_string(&ctx.config.options.merged_for(ctx.target));
    let script_name = generated_file_name("sqlite-amalgamation.sh");
    let script = amalgamation_script(
        amalgamation_build_option(ctx.target),
        &options,
        AMALGAMATION,
    );
    write_generated(src_dir, &script_name, &script)?;

    ctx.log.info(&format!("creating amalgamation source: {AMALGAMATION}"));
    let spec = shell_spec(ctx.host, &ctx.config.tools.windows, src_dir, &script_name);
    execute(ctx.runner, ctx.log, &spec, &script_name)?;

    if !amalgamation.exists() {
        return Err(BuilderError::AmalgamationMissing {
            path: amalgamation.display().to_string(),
        });
    }
    ctx.log.info(&format!("amalgamation source created: {AMALGAMATION}"));
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn build_options_map_android_to_linux_triples() {
        assert_eq!(amalgamation_build_option(TargetId::AndroidArm64), "aarch64-linux");
        assert_eq!(amalgamation_build_option(TargetId::AndroidX64), "x86_64-linux");
        assert_eq!(amalgamation_build_option(TargetId::IosArm64), "");
        assert_eq!(amalgamation_build_option(TargetId::MacosX64), "");
    }
}
