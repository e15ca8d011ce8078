//! Filesystem utilities for Cipherforge.

use std::path::{Path, PathBuf};

use crate::error::UtilError;

/// Create a directory and all parent directories if they do not exist.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> Result<(), UtilError> {
    std::fs::create_dir_all(path).map_err(|source| UtilError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Remove a directory and all its contents. No error if the directory is absent.
///
/// # Errors
/// Returns an error if the directory exists but cannot be removed.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Remove a file if it exists.
///
/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn remove_file_if_exists(path: &Path) -> Result<(), UtilError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(UtilError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}

/// Recursively copy the contents of `src` into `dest`, creating `dest`.
///
/// Used to give each build target its own private copy of the shared
/// cloned source tree, so targets never mutate a shared checkout.
///
/// # Errors
/// Returns an error if any directory or file cannot be read or written.
pub fn copy_dir_all(src: &Path, dest: &Path) -> Result<(), UtilError> {
    ensure_dir(dest)?;
    let entries = std::fs::read_dir(src).map_err(|source| UtilError::Io {
        path: src.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: src.display().to_string(),
            source,
        })?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir_all(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|source| UtilError::Io {
                path: to.display().to_string(),
                source,
            })?;
        }
    }
    Ok(())
}

/// Copy files under `src` matching any of `patterns` into `dest`,
/// preserving relative subpaths. Directories themselves are never copied,
/// so empty directories do not appear in `dest`. An empty pattern list
/// copies every file.
///
/// A file matches when its path relative to `src`, or its bare file name,
/// matches one of the glob patterns.
///
/// Returns the destination paths of the copied files, sorted.
///
/// # Errors
/// Returns an error if a pattern is invalid or a file cannot be copied.
pub fn copy_matching(
    src: &Path,
    dest: &Path,
    patterns: &[String],
) -> Result<Vec<PathBuf>, UtilError> {
    let compiled = compile_patterns(patterns)?;
    let mut files = Vec::new();
    collect_relative_files(src, Path::new(""), &mut files)?;
    files.sort();

    let mut copied = Vec::new();
    for relative in files {
        if !matches_any(&compiled, &relative) {
            continue;
        }
        let to = dest.join(&relative);
        if let Some(parent) = to.parent() {
            ensure_dir(parent)?;
        }
        std::fs::copy(src.join(&relative), &to).map_err(|source| UtilError::Io {
            path: to.display().to_string(),
            source,
        })?;
        copied.push(to);
    }
    Ok(copied)
}

/// Mark a file executable (no-op on platforms without unix permissions).
///
/// # Errors
/// Returns an error if the permissions cannot be changed.
pub fn make_executable(path: &Path) -> Result<(), UtilError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(
            |source| UtilError::Io {
                path: path.display().to_string(),
                source,
            },
        )?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, UtilError> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p).map_err(|e| UtilError::GlobPattern {
                pattern: p.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

fn matches_any(patterns: &[glob::Pattern], relative: &Path) -> bool {
    if patterns.is_empty() {
        return true;
    }
    let name = relative.file_name().map(Path::new);
    patterns
        .iter()
        .any(|p| p.matches_path(relative) || name.is_some_and(|n| p.matches_path(n)))
}

fn collect_relative_files(
    root: &Path,
    relative: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<(), UtilError> {
    let dir = root.join(relative);
    let entries = std::fs::read_dir(&dir).map_err(|source| UtilError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| UtilError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        let child = relative.join(entry.file_name());
        if entry.path().is_dir() {
            collect_relative_files(root, &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b").join("c");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn remove_dir_all_if_exists_absent_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        remove_dir_all_if_exists(&tmp.path().join("missing")).unwrap();
    }

    #[test]
    fn copy_dir_all_copies_nested_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("top.txt"), b"top").unwrap();
        fs::write(src.join("sub").join("inner.txt"), b"inner").unwrap();

        let dest = tmp.path().join("dest");
        copy_dir_all(&src, &dest).unwrap();
        assert_eq!(fs::read(dest.join("top.txt")).unwrap(), b"top");
        assert_eq!(fs::read(dest.join("sub").join("inner.txt")).unwrap(), b"inner");
    }

    #[test]
    fn copy_matching_copies_only_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("work");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("libx.a"), b"a").unwrap();
        fs::write(src.join("libx.so"), b"so").unwrap();
        fs::write(src.join("readme.txt"), b"r").unwrap();

        let dest = tmp.path().join("out");
        let copied = copy_matching(&src, &dest, &["*.a".to_owned()]).unwrap();

        assert_eq!(copied, vec![dest.join("libx.a")]);
        assert!(dest.join("libx.a").exists());
        assert!(!dest.join("libx.so").exists());
        assert!(!dest.join("readme.txt").exists());
    }

    #[test]
    fn copy_matching_excludes_empty_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("work");
        fs::create_dir_all(src.join("empty")).unwrap();
        fs::write(src.join("lib.a"), b"a").unwrap();

        let dest = tmp.path().join("out");
        copy_matching(&src, &dest, &["*.a".to_owned()]).unwrap();
        assert!(!dest.join("empty").exists());
    }

    #[test]
    fn copy_matching_empty_patterns_copies_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("work");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.txt"), b"1").unwrap();
        fs::write(src.join("sub").join("b.txt"), b"2").unwrap();

        let dest = tmp.path().join("out");
        let copied = copy_matching(&src, &dest, &[]).unwrap();
        assert_eq!(copied.len(), 2);
        assert!(dest.join("sub").join("b.txt").exists());
    }

    #[test]
    fn copy_matching_matches_file_name_at_any_depth() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("work");
        fs::create_dir_all(src.join("deep")).unwrap();
        fs::write(src.join("deep").join("libc.so.3"), b"x").unwrap();

        let dest = tmp.path().join("out");
        let copied = copy_matching(&src, &dest, &["*.so.*".to_owned()]).unwrap();
        assert_eq!(copied, vec![dest.join("deep").join("libc.so.3")]);
    }

    #[test]
    fn copy_matching_invalid_pattern_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let result = copy_matching(tmp.path(), tmp.path(), &["[".to_owned()]);
        assert!(result.is_err());
    }
}
