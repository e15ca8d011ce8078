//! Archive extraction for source drops (`.tar.gz` and `.zip`).

use std::path::Path;

use crate::error::UtilError;

/// Archive suffix used on Windows hosts.
pub const ZIP_SUFFIX: &str = ".zip";
/// Archive suffix used on Linux and macOS hosts.
pub const TAR_GZ_SUFFIX: &str = ".tar.gz";

/// Whether the file name carries the Windows archive suffix.
pub fn is_zip(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().ends_with(ZIP_SUFFIX))
}

/// Extract `archive` into `dest_parent`, dispatching on the suffix.
///
/// Source archives carry their own versioned top-level directory (e.g.
/// `openssl-openssl_3.0.1/`), so extraction targets the *parent* of the
/// desired source tree and the archive's top directory becomes the tree,
/// no redundant extra nesting.
///
/// # Errors
/// Returns an error if the suffix is unrecognized or extraction fails.
pub fn extract_archive(archive: &Path, dest_parent: &Path) -> Result<(), UtilError> {
    crate::fs::ensure_dir(dest_parent)?;
    if is_zip(archive) {
        extract_zip(archive, dest_parent)
    } else if archive
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_lowercase().ends_with(TAR_GZ_SUFFIX))
    {
        extract_tar_gz(archive, dest_parent)
    } else {
        Err(UtilError::UnknownArchiveKind {
            path: archive.display().to_string(),
        })
    }
}

fn extract_tar_gz(archive: &Path, dest: &Path) -> Result<(), UtilError> {
    let file = std::fs::File::open(archive).map_err(|source| UtilError::Io {
        path: archive.display().to_string(),
        source,
    })?;
    let decoder = flate2::read::GzDecoder::new(file);
    let mut tarball = tar::Archive::new(decoder);
    tarball.unpack(dest).map_err(|e| UtilError::Archive {
        path: archive.display().to_string(),
        message: e.to_string(),
    })
}

fn extract_zip(archive: &Path, dest: &Path) -> Result<(), UtilError> {
    let file = std::fs::File::open(archive).map_err(|source| UtilError::Io {
        path: archive.display().to_string(),
        source,
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| UtilError::Archive {
        path: archive.display().to_string(),
        message: e.to_string(),
    })?;
    zip.extract(dest).map_err(|e| UtilError::Archive {
        path: archive.display().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::io::Write;

    use super::*;

    fn make_tar_gz(dir: &Path) -> std::path::PathBuf {
        let payload = dir.join("payload");
        fs::create_dir_all(payload.join("proj-1.0")).unwrap();
        fs::write(payload.join("proj-1.0").join("Configure"), b"#!perl").unwrap();

        let archive_path = dir.join("proj-1.0.tar.gz");
        let file = fs::File::create(&archive_path).unwrap();
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all("proj-1.0", payload.join("proj-1.0"))
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();
        archive_path
    }

    fn make_zip(dir: &Path) -> std::path::PathBuf {
        let archive_path = dir.join("proj-1.0.zip");
        let file = fs::File::create(&archive_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("proj-1.0/", options).unwrap();
        writer.start_file("proj-1.0/Configure", options).unwrap();
        writer.write_all(b"#!perl").unwrap();
        writer.finish().unwrap();
        archive_path
    }

    #[test]
    fn is_zip_by_suffix() {
        assert!(is_zip(Path::new("source-v1.zip")));
        assert!(is_zip(Path::new("SOURCE.ZIP")));
        assert!(!is_zip(Path::new("source-v1.tar.gz")));
    }

    #[test]
    fn extract_tar_gz_keeps_archive_top_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_tar_gz(tmp.path());
        let dest = tmp.path().join("compile");

        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("proj-1.0").join("Configure").exists());
    }

    #[test]
    fn extract_zip_keeps_archive_top_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = make_zip(tmp.path());
        let dest = tmp.path().join("compile");

        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("proj-1.0").join("Configure").exists());
    }

    #[test]
    fn unknown_suffix_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let bogus = tmp.path().join("source.rar");
        fs::write(&bogus, b"x").unwrap();
        let result = extract_archive(&bogus, &tmp.path().join("out"));
        assert!(result.is_err());
    }
}
