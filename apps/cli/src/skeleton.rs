//! `themekit init`: lay down a new project from embedded templates.

use std::path::{Path, PathBuf};

use themekit_shared::{Result, ThemekitError, init_config};

/// Placeholder replaced with the theme name in text templates.
const THEME_NAME_VAR: &str = "{{theme_name}}";

/// `(relative path, contents)` of every skeleton file.
const FILES: &[(&str, &str)] = &[
    (
        "front-end/src/styles/main.scss",
        include_str!("../skeleton/front-end/src/styles/main.scss"),
    ),
    (
        "front-end/src/styles/_variables.scss",
        include_str!("../skeleton/front-end/src/styles/_variables.scss"),
    ),
    (
        "front-end/src/scripts/main.js",
        include_str!("../skeleton/front-end/src/scripts/main.js"),
    ),
    (
        "front-end/src/templates/index.hbs",
        include_str!("../skeleton/front-end/src/templates/index.hbs"),
    ),
    (
        "front-end/src/templates/partials/header.hbs",
        include_str!("../skeleton/front-end/src/templates/partials/header.hbs"),
    ),
    (
        "front-end/src/assets/robots.txt",
        include_str!("../skeleton/front-end/src/assets/robots.txt"),
    ),
    (
        "back-end/src/index.php",
        include_str!("../skeleton/back-end/src/index.php"),
    ),
    (
        "back-end/src/style.css",
        include_str!("../skeleton/back-end/src/style.css"),
    ),
    (
        "credentials.example.json",
        include_str!("../skeleton/credentials.example.json"),
    ),
    (".gitignore", include_str!("../skeleton/gitignore")),
];

/// Empty directories the pipelines read from.
const DIRS: &[&str] = &["front-end/src/images", "front-end/src/vendors"];

/// Scaffold a project in `dir`. Existing files are left alone.
///
/// Fails if `dir` already has a `themekit.toml`.
pub fn scaffold(dir: &Path, name: &str) -> Result<Vec<PathBuf>> {
    let config = init_config(dir, Some(name))?;
    let mut written = vec![config];

    for (rel, contents) in FILES {
        let path = dir.join(rel);
        if path.exists() {
            tracing::warn!(path = %path.display(), "exists, not overwritten");
            continue;
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ThemekitError::io(parent, e))?;
        }
        std::fs::write(&path, contents.replace(THEME_NAME_VAR, name))
            .map_err(|e| ThemekitError::io(&path, e))?;
        written.push(path);
    }

    for rel in DIRS {
        let path = dir.join(rel);
        std::fs::create_dir_all(&path).map_err(|e| ThemekitError::io(&path, e))?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use themekit_core::builtin_graph;
    use themekit_shared::{ProjectLayout, load_config};

    use super::*;

    #[test]
    fn scaffold_creates_buildable_layout() {
        let dir = tempfile::tempdir().unwrap();
        let site = dir.path().join("acme");

        let written = scaffold(&site, "acme").unwrap();
        assert_eq!(written.len(), FILES.len() + 1);

        let style = std::fs::read_to_string(site.join("back-end/src/style.css")).unwrap();
        assert!(style.contains("Theme Name: acme"));
        let index = std::fs::read_to_string(site.join("back-end/src/index.php")).unwrap();
        assert!(index.contains("have_posts()"));
        assert!(site.join("front-end/src/images").is_dir());

        let config = load_config(&site).unwrap();
        assert_eq!(config.project.name.as_deref(), Some("acme"));
        let layout = ProjectLayout::resolve(&config, &site);
        assert!(builtin_graph(&config, &layout).is_ok());
    }

    #[test]
    fn scaffold_refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        scaffold(dir.path(), "one").unwrap();
        let err = scaffold(dir.path(), "two").unwrap_err();
        assert!(matches!(err, ThemekitError::Config { .. }));
    }
}
