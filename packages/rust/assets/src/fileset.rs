//! Glob-filtered file selection under a root directory.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use themekit_shared::{Result, ThemekitError};

/// `*` stays inside one directory; `**/` crosses directories.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A sorted set of files under `root`, stored as root-relative paths.
#[derive(Debug, Clone)]
pub struct FileSet {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl FileSet {
    /// Walk `root` and keep every file whose relative path matches `pattern`.
    ///
    /// A missing root yields an empty set, the same as an empty source glob.
    pub fn collect(root: &Path, pattern: &str) -> Result<Self> {
        let matcher = Pattern::new(pattern).map_err(|e| {
            ThemekitError::validation(format!("invalid glob pattern '{pattern}': {e}"))
        })?;

        let mut files = Vec::new();
        if root.is_dir() {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = entry.map_err(|e| {
                    let path = e.path().unwrap_or(root).to_path_buf();
                    ThemekitError::io(path, std::io::Error::from(e))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let rel = entry
                    .path()
                    .strip_prefix(root)
                    .map_err(|e| ThemekitError::validation(e.to_string()))?;
                if matcher.matches_path_with(rel, MATCH_OPTIONS) {
                    files.push(rel.to_path_buf());
                }
            }
        }
        files.sort();

        tracing::debug!(root = %root.display(), pattern, count = files.len(), "collected files");

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    /// The directory the relative paths are anchored at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Root-relative paths, sorted.
    pub fn relative(&self) -> &[PathBuf] {
        &self.files
    }

    /// `(absolute, relative)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PathBuf, &Path)> + '_ {
        self.files
            .iter()
            .map(|rel| (self.root.join(rel), rel.as_path()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    #[test]
    fn double_star_crosses_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "main.scss");
        touch(dir.path(), "components/_button.scss");
        touch(dir.path(), "components/readme.md");

        let set = FileSet::collect(dir.path(), "**/*.scss").unwrap();
        assert_eq!(
            set.relative(),
            &[
                PathBuf::from("components/_button.scss"),
                PathBuf::from("main.scss")
            ]
        );
    }

    #[test]
    fn single_star_stays_top_level() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "index.hbs");
        touch(dir.path(), "partials/header.hbs");

        let set = FileSet::collect(dir.path(), "*.hbs").unwrap();
        assert_eq!(set.relative(), &[PathBuf::from("index.hbs")]);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let set = FileSet::collect(&dir.path().join("nope"), "**/*").unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn bad_pattern_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileSet::collect(dir.path(), "[").unwrap_err();
        assert!(matches!(err, ThemekitError::Validation { .. }));
    }
}
