//! HTML minification.

use std::path::{Path, PathBuf};

use minify_html::Cfg;

use themekit_shared::Result;

use super::Transformer;

/// Collapses whitespace, drops comments, and minifies inline CSS and JS.
/// Output keeps the input's relative path, so it can rewrite a tree in place.
pub struct HtmlMinifier {
    cfg: Cfg,
}

impl HtmlMinifier {
    pub fn new() -> Self {
        let mut cfg = Cfg::new();
        cfg.minify_css = true;
        cfg.minify_js = true;
        cfg.keep_comments = false;
        Self { cfg }
    }
}

impl Default for HtmlMinifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Transformer for HtmlMinifier {
    fn name(&self) -> &str {
        "html"
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        rel.to_path_buf()
    }

    fn transform(&self, _path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        Ok(minify_html::minify(input, &self.cfg))
    }
}
