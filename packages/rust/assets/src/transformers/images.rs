//! Lossless image optimization.

use std::path::{Path, PathBuf};

use themekit_shared::{Result, ThemekitError, ToolCommand};

use super::{Transformer, run_tool};

/// oxipng optimization level; 2 is its own default trade-off.
const PNG_PRESET: u8 = 2;

/// Optimizes PNGs in-process; other formats are copied unchanged unless an
/// external optimizer is configured, in which case every image goes through it.
pub struct ImageOptimizer {
    external: Option<ToolCommand>,
}

impl ImageOptimizer {
    pub fn new(external: Option<ToolCommand>) -> Self {
        Self { external }
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
}

impl Transformer for ImageOptimizer {
    fn name(&self) -> &str {
        "images"
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        rel.to_path_buf()
    }

    fn transform(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        if let Some(tool) = &self.external {
            return run_tool(tool, path, input);
        }

        if !is_png(path) {
            return Ok(input.to_vec());
        }

        let optimized = oxipng::optimize_from_memory(input, &oxipng::Options::from_preset(PNG_PRESET))
            .map_err(|e| ThemekitError::transform(self.name(), path, e.to_string()))?;

        // Never ship a larger file than we were given.
        if optimized.len() < input.len() {
            Ok(optimized)
        } else {
            Ok(input.to_vec())
        }
    }
}
