//! JavaScript minification through an external minifier.

use std::path::{Path, PathBuf};

use themekit_shared::{Result, ToolCommand};

use super::{Transformer, run_tool, with_suffix};

/// Pipes each script through the configured minifier (`main.js` → `main.min.js`).
pub struct ScriptMinifier {
    tool: ToolCommand,
}

impl ScriptMinifier {
    pub fn new(tool: ToolCommand) -> Self {
        Self { tool }
    }
}

impl Transformer for ScriptMinifier {
    fn name(&self) -> &str {
        "scripts"
    }

    fn output_path(&self, rel: &Path) -> PathBuf {
        with_suffix(rel, ".min", "js")
    }

    fn transform(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
        run_tool(&self.tool, path, input)
    }
}
