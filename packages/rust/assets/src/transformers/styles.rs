//! Sass/SCSS compilation and vendor prefixing.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use themekit_shared::{Result, ThemekitError, ToolCommand};

use super::{Transformer, run_tool, with_suffix};

/// Compiles SCSS to compressed CSS (`main.scss` → `main.min.css`).
///
/// Files starting with `_` are import-only partials and produce no output.
/// Compiled CSS is vendor-prefixed for the configured browserslist queries,
/// unless an external post-processor is set, which then receives the CSS on
/// stdin instead.
pub struct StyleCompiler {
    postprocess: Option<ToolCommand>,
    targets: Option<Targets>,
}

impl StyleCompiler {
    pub fn new(postprocess: Option<ToolCommand>, browsers: &[String]) -> Result<Self> {
        let targets = if postprocess.is_some() || browsers.is_empty() {
            None
        } else {
            let resolved = Browsers::from_browserslist(browsers).map_err(|e| {
                ThemekitError::config(format!("invalid [tools] browsers {browsers:?}: {e}"))
            })?;
            resolved.map(|browsers| Targets {
                browsers: Some(browsers),
                ..Targets::default()
            })
        };
        Ok(Self {
            postprocess,
            targets,
        })
    }

    fn prefix(&self, path: &Path, css: &str, targets: Targets) -> Result<String> {
        let fail = |e: String| ThemekitError::transform(self.name(), path, e);

        let mut sheet =
            StyleSheet::parse(css, ParserOptions::default()).map_err(|e| fail(e.to_string()))?;
        sheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| fail(e.to_string()))?;
        let printed = sheet
            .to_css(PrinterOptions {
                minify: true,
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| fail(e.to_string()))?;
        Ok(printed.code)
    }
}

impl Transformer for StyleCompiler {
    fn name(&self) -> &str {
        "styles"
    }

    fn accepts(&self, rel: &Path) -> bool {
        rel.file_name()
            .is_some_and(|n| !n.to_string_lossy().starts_with('_'))
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        with_suffix(rel, ".min", "css")
    }

    fn transform(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        let source = std::str::from_utf8(input)
            .map_err(|e| ThemekitError::transform(self.name(), path, e.to_string()))?;

        let mut options = grass::Options::default().style(grass::OutputStyle::Compressed);
        if let Some(parent) = path.parent() {
            options = options.load_path(parent);
        }

        let css = grass::from_string(source.to_owned(), &options).map_err(|e| {
            tracing::error!(file = %path.display(), error = %e, "sass compilation failed");
            ThemekitError::transform(self.name(), path, e.to_string())
        })?;

        if let Some(tool) = &self.postprocess {
            return run_tool(tool, path, css.as_bytes());
        }
        match self.targets {
            Some(targets) => self.prefix(path, &css, targets).map(String::into_bytes),
            None => Ok(css.into_bytes()),
        }
    }
}
