//! Handlebars template rendering.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;

use themekit_shared::{Result, ThemekitError};

use super::{Transformer, with_suffix};
use crate::FileSet;

/// Matches plain `{{> name}}` references. Block partials (`{{#> name}}`)
/// carry their own fallback and are left to Handlebars.
static PARTIAL_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{~?>\s*([A-Za-z0-9_./-]+)").expect("valid partial regex")
});

/// Renders `*.hbs` templates to `.html` with a directory of partials.
///
/// Every file under the partials directory is registered by its relative
/// path without extension (`partials/nav/menu.hbs` → `nav/menu`). A partial
/// that is referenced but not present renders as empty, with a warning.
pub struct TemplateRenderer {
    registry: Handlebars<'static>,
    data: serde_json::Value,
}

impl TemplateRenderer {
    /// Load partials from `partials` (missing directory = no partials).
    pub fn new(partials: &Path, data: serde_json::Value) -> Result<Self> {
        let mut registry = Handlebars::new();

        let files = FileSet::collect(partials, "**/*")?;
        for (abs, rel) in files.iter() {
            let source =
                std::fs::read_to_string(&abs).map_err(|e| ThemekitError::io(&abs, e))?;
            let name = partial_name(rel);
            registry
                .register_partial(&name, source)
                .map_err(|e| ThemekitError::transform("templates", &abs, e.to_string()))?;
            tracing::debug!(partial = %name, "registered partial");
        }

        Ok(Self { registry, data })
    }
}

fn partial_name(rel: &Path) -> String {
    rel.with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl Transformer for TemplateRenderer {
    fn name(&self) -> &str {
        "templates"
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        with_suffix(rel, "", "html")
    }

    fn transform(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(input)
            .map_err(|e| ThemekitError::transform(self.name(), path, e.to_string()))?;

        let missing: Vec<&str> = PARTIAL_REF
            .captures_iter(source)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|name| !self.registry.has_template(name))
            .collect();

        let rendered = if missing.is_empty() {
            self.registry.render_template(source, &self.data)
        } else {
            let mut registry = self.registry.clone();
            for name in missing {
                tracing::warn!(file = %path.display(), partial = name, "partial not found, rendering empty");
                registry
                    .register_partial(name, "")
                    .map_err(|e| ThemekitError::transform(self.name(), path, e.to_string()))?;
            }
            registry.render_template(source, &self.data)
        };

        rendered
            .map(String::into_bytes)
            .map_err(|e| ThemekitError::transform(self.name(), path, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer_with(partials: &[(&str, &str)]) -> (tempfile::TempDir, TemplateRenderer) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, body) in partials {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, body).unwrap();
        }
        let data = serde_json::json!({ "project": { "name": "starter" } });
        let renderer = TemplateRenderer::new(dir.path(), data).unwrap();
        (dir, renderer)
    }

    #[test]
    fn renders_partials_and_data() {
        let (_dir, renderer) = renderer_with(&[
            ("header.hbs", "<header>{{project.name}}</header>"),
            ("nav/menu.hbs", "<nav></nav>"),
        ]);
        let out = renderer
            .transform(
                Path::new("index.hbs"),
                b"<body>{{> header}}<main></main></body>",
            )
            .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<body><header>starter</header><main></main></body>"
        );
    }

    #[test]
    fn missing_partial_renders_empty() {
        let (_dir, renderer) = renderer_with(&[]);
        let out = renderer
            .transform(Path::new("index.hbs"), b"<p>{{> footer}}</p>")
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<p></p>");
    }

    #[test]
    fn missing_block_partial_keeps_its_fallback() {
        let (_dir, renderer) = renderer_with(&[]);
        let out = renderer
            .transform(
                Path::new("index.hbs"),
                b"<p>{{#> sidebar}}default{{/sidebar}}</p>",
            )
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "<p>default</p>");
    }

    #[test]
    fn output_is_html() {
        let (_dir, renderer) = renderer_with(&[]);
        assert_eq!(
            renderer.output_path(Path::new("about.hbs")),
            PathBuf::from("about.html")
        );
    }

    #[test]
    fn partial_names_use_forward_slashes() {
        assert_eq!(partial_name(Path::new("nav/menu.hbs")), "nav/menu");
        assert_eq!(partial_name(Path::new("header.hbs")), "header");
    }
}
