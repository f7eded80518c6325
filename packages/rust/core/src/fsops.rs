//! Copy, clean and rename primitives used by the pipeline steps.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use themekit_assets::FileSet;
use themekit_shared::{Result, ThemekitError};

/// Delete each path recursively. Missing paths are skipped.
///
/// Returns the paths that existed and were removed.
pub fn clean(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    for path in paths {
        if path.parent().is_none() || path.as_os_str().is_empty() {
            return Err(ThemekitError::validation(format!(
                "refusing to clean '{}'",
                path.display()
            )));
        }

        let result = match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
            Ok(_) => std::fs::remove_file(path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => Err(e),
        };
        result.map_err(|e| ThemekitError::io(path, e))?;

        debug!(path = %path.display(), "removed");
        removed.push(path.clone());
    }

    Ok(removed)
}

/// Copy every file under `from` matching `pattern` into each of `dests`,
/// preserving relative paths. Returns the files written.
pub fn copy_tree(from: &Path, pattern: &str, dests: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let files = FileSet::collect(from, pattern)?;
    if files.is_empty() {
        warn!(from = %from.display(), pattern, "nothing to copy");
        return Ok(Vec::new());
    }

    let mut written = Vec::with_capacity(files.len() * dests.len());
    for dest in dests {
        for (abs, rel) in files.iter() {
            let target = dest.join(rel);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| ThemekitError::io(parent, e))?;
            }
            std::fs::copy(&abs, &target).map_err(|e| ThemekitError::io(&abs, e))?;
            written.push(target);
        }
        debug!(from = %from.display(), dest = %dest.display(), files = files.len(), "copied");
    }

    Ok(written)
}

/// Move every `*.from` file under `dir` to the same path with extension `to`.
pub fn rename_extension(dir: &Path, from: &str, to: &str) -> Result<Vec<PathBuf>> {
    let files = FileSet::collect(dir, &format!("**/*.{from}"))?;

    let mut renamed = Vec::with_capacity(files.len());
    for (abs, _) in files.iter() {
        let target = abs.with_extension(to);
        std::fs::rename(&abs, &target).map_err(|e| ThemekitError::io(&abs, e))?;
        renamed.push(target);
    }

    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn clean_removes_trees_and_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        touch(&dist.join("assets/css/main.min.css"), "body{}");
        let stray = dir.path().join("stray.txt");
        touch(&stray, "x");

        let removed = clean(&[dist.clone(), dir.path().join("never-built"), stray.clone()]).unwrap();

        assert_eq!(removed, vec![dist.clone(), stray.clone()]);
        assert!(!dist.exists());
        assert!(!stray.exists());
    }

    #[test]
    fn clean_refuses_filesystem_root() {
        let err = clean(&[PathBuf::from("/")]).unwrap_err();
        assert!(matches!(err, ThemekitError::Validation { .. }));
    }

    #[test]
    fn copy_into_several_destinations() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        touch(&src.join("index.php"), "<?php");
        touch(&src.join("inc/setup.php"), "<?php");
        touch(&src.join("notes.md"), "skip me");

        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let written = copy_tree(&src, "**/*.php", &[a.clone(), b.clone()]).unwrap();

        assert_eq!(written.len(), 4);
        assert!(a.join("inc/setup.php").is_file());
        assert!(b.join("index.php").is_file());
        assert!(!a.join("notes.md").exists());
    }

    #[test]
    fn copy_from_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let written = copy_tree(&dir.path().join("vendors"), "**/*", &[dir.path().join("out")]).unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn rename_html_to_php() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("index.html"), "<p>home</p>");
        touch(&dir.path().join("pages/about.html"), "<p>about</p>");
        touch(&dir.path().join("style.css"), "body{}");

        let renamed = rename_extension(dir.path(), "html", "php").unwrap();

        assert_eq!(renamed.len(), 2);
        assert!(dir.path().join("index.php").is_file());
        assert!(dir.path().join("pages/about.php").is_file());
        assert!(!dir.path().join("index.html").exists());
        assert!(dir.path().join("style.css").is_file());
    }
}
