//! Zip archive discovery and extraction.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use zip::ZipArchive;

use themekit_shared::{Result, ThemekitError};

/// Archives in `dir` that [`extract`] understands, sorted by name.
///
/// Other archive formats are reported and skipped.
pub fn find_archives(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut archives = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| ThemekitError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| ThemekitError::io(dir, e))?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.ends_with(".zip") {
            archives.push(path);
        } else if name.ends_with(".tar") || name.ends_with(".tar.gz") || name.ends_with(".tar.bz2") {
            warn!(archive = %path.display(), "only .zip archives are supported, skipping");
        }
    }
    archives.sort();
    Ok(archives)
}

/// Unpack `archive` into `dest`, dropping the first `strip` path components.
///
/// Entries that would land outside `dest` are rejected. Returns the files written.
pub fn extract(archive: &Path, dest: &Path, strip: usize) -> Result<Vec<PathBuf>> {
    let file = File::open(archive).map_err(|e| ThemekitError::io(archive, e))?;
    let mut zip = ZipArchive::new(file)
        .map_err(|e| ThemekitError::Archive(format!("{}: {e}", archive.display())))?;

    std::fs::create_dir_all(dest).map_err(|e| ThemekitError::io(dest, e))?;

    let mut written = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ThemekitError::Archive(format!("{}: {e}", archive.display())))?;

        let Some(enclosed) = entry.enclosed_name() else {
            return Err(ThemekitError::Archive(format!(
                "{}: entry '{}' escapes the archive root",
                archive.display(),
                entry.name()
            )));
        };

        let relative: PathBuf = enclosed.components().skip(strip).collect();
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dest.join(&relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| ThemekitError::io(&target, e))?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ThemekitError::io(parent, e))?;
        }
        let mut out = File::create(&target).map_err(|e| ThemekitError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| ThemekitError::io(&target, e))?;
        written.push(target);
    }

    info!(
        archive = %archive.display(),
        dest = %dest.display(),
        files = written.len(),
        "archive extracted"
    );
    Ok(written)
}
