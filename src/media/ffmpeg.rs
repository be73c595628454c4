//! FFmpeg locator utility.
//!
//! Checks standard installation locations before walking the directories in
//! `PATH`, so the encoder can be found even when the process runs with a
//! trimmed environment (service managers, containers).

use std::path::{Path, PathBuf};

use crate::error::EncodingError;

#[cfg(target_os = "windows")]
const BINARY_NAME: &str = "ffmpeg.exe";
#[cfg(not(target_os = "windows"))]
const BINARY_NAME: &str = "ffmpeg";

/// Locates the ffmpeg binary on the system.
///
/// # Errors
/// Returns `EncodingError::Launch` with installation hints if no binary is found.
pub fn find_ffmpeg() -> Result<PathBuf, EncodingError> {
    let path_dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default();

    let found = locate(standard_locations(), &path_dirs).ok_or_else(|| {
        EncodingError::Launch(
            "ffmpeg not found. Please install ffmpeg:\n\
             macOS: brew install ffmpeg\n\
             Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
             Windows: Download from https://ffmpeg.org/download.html"
                .to_string(),
        )
    })?;

    tracing::debug!("Found ffmpeg at: {}", found.display());
    Ok(found)
}

fn standard_locations() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/snap/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    } else {
        vec![]
    }
}

/// First existing candidate, then the first `PATH` directory containing the binary.
fn locate(candidates: Vec<PathBuf>, path_dirs: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .into_iter()
        .find(|candidate| candidate.is_file())
        .or_else(|| {
            path_dirs
                .iter()
                .map(|dir| dir.join(BINARY_NAME))
                .find(|candidate| is_executable(candidate))
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
