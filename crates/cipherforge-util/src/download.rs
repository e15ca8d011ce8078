//! HTTP download with progress reporting and SHA-256 hashing.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::UtilError;

/// Result of a completed download.
#[derive(Debug, Clone)]
pub struct DownloadResult {
    /// Hex-encoded SHA-256 of the downloaded bytes.
    pub sha256: String,
    /// Total bytes written.
    pub bytes: u64,
}

/// Download `url` to `dest`, streaming to disk with progress on stderr.
///
/// The SHA-256 of the content is computed during the stream so source
/// archives can be recorded and compared across runs.
///
/// # Errors
/// Returns an error if the HTTP request fails, the file cannot be
/// written, or a read error occurs during streaming.
pub fn download_to_file(url: &str, dest: &Path, label: &str) -> Result<DownloadResult, UtilError> {
    let agent = ureq::Agent::new_with_config(
        ureq::config::Config::builder()
            .timeout_connect(Some(std::time::Duration::from_secs(30)))
            .timeout_global(Some(std::time::Duration::from_secs(600)))
            .build(),
    );

    let response = agent.get(url).call().map_err(|e| UtilError::Download {
        url: url.to_owned(),
        message: e.to_string(),
    })?;

    let content_length: Option<u64> = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());

    let mut body = response.into_body();
    let mut file = std::fs::File::create(dest).map_err(|source| UtilError::Io {
        path: dest.display().to_string(),
        source,
    })?;

    let mut hasher = Sha256::new();
    let mut downloaded: u64 = 0;
    let mut last_pct: u8 = 0;
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = std::io::Read::read(&mut body.as_reader(), &mut buf).map_err(|e| {
            UtilError::Download {
                url: url.to_owned(),
                message: e.to_string(),
            }
        })?;
        if n == 0 {
            break;
        }

        // SAFETY: `n` is the return value of `read(&mut buf)`, so `n <= buf.len()`.
        #[allow(clippy::indexing_slicing)]
        let chunk = &buf[..n];
        std::io::Write::write_all(&mut file, chunk).map_err(|source| UtilError::Io {
            path: dest.display().to_string(),
            source,
        })?;
        hasher.update(chunk);

        downloaded = downloaded.saturating_add(n as u64);

        if let Some(total) = content_length {
            if total > 0 {
                #[allow(clippy::cast_possible_truncation)]
                let pct = ((downloaded * 100) / total) as u8;
                if pct != last_pct && pct.is_multiple_of(10) {
                    eprint!("\r    Downloading {label}... {pct}%");
                    last_pct = pct;
                }
            }
        }
    }

    if content_length.is_some() {
        eprintln!("\r    Downloading {label}... done   ");
    } else {
        let mb = downloaded / (1024 * 1024);
        eprintln!("    Downloaded {label} ({mb} MB)");
    }

    Ok(DownloadResult {
        sha256: format!("{:x}", hasher.finalize()),
        bytes: downloaded,
    })
}
