//! Transformer trait and the built-in asset transformers.
//!
//! A transformer maps one input file to one output file. [`apply`] drives a
//! transformer over a [`FileSet`] and writes the outputs under a destination
//! directory, preserving relative paths.

mod html;
mod images;
mod scripts;
mod styles;
mod templates;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use themekit_shared::{Result, ThemekitError, ToolCommand, ToolsConfig};

use crate::FileSet;

pub use html::HtmlMinifier;
pub use images::ImageOptimizer;
pub use scripts::ScriptMinifier;
pub use styles::StyleCompiler;
pub use templates::TemplateRenderer;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A one-file-in, one-file-out asset transformation.
pub trait Transformer: Send + Sync {
    /// Human-readable transformer name for tracing and errors.
    fn name(&self) -> &str;

    /// Whether `rel` produces an output at all (e.g. Sass partials do not).
    fn accepts(&self, _rel: &Path) -> bool {
        true
    }

    /// Output path, relative to the destination directory.
    fn output_path(&self, rel: &Path) -> PathBuf;

    /// Transform the contents of `path`.
    fn transform(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>>;
}

/// Run `transformer` over `files`, writing results under `dest`.
///
/// Returns the absolute output paths in input order. Every input is read
/// before its output is written, so `dest` may equal the input root.
pub fn apply(transformer: &dyn Transformer, files: &FileSet, dest: &Path) -> Result<Vec<PathBuf>> {
    let mut outputs = Vec::with_capacity(files.len());

    for (abs, rel) in files.iter() {
        if !transformer.accepts(rel) {
            tracing::trace!(file = %rel.display(), transformer = transformer.name(), "skipped");
            continue;
        }

        let input = std::fs::read(&abs).map_err(|e| ThemekitError::io(&abs, e))?;
        let output = transformer.transform(&abs, &input)?;

        let target = dest.join(transformer.output_path(rel));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ThemekitError::io(parent, e))?;
        }
        std::fs::write(&target, &output).map_err(|e| ThemekitError::io(&target, e))?;

        tracing::debug!(
            transformer = transformer.name(),
            input = %rel.display(),
            output = %target.display(),
            bytes_in = input.len(),
            bytes_out = output.len(),
            "transformed"
        );
        outputs.push(target);
    }

    Ok(outputs)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The built-in transformers, addressable by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformerKind {
    Styles,
    Scripts,
    Images,
    /// Handlebars templates; partials are loaded from the given directory.
    Templates { partials: PathBuf },
    Html,
}

impl TransformerKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Styles => "styles",
            Self::Scripts => "scripts",
            Self::Images => "images",
            Self::Templates { .. } => "templates",
            Self::Html => "html",
        }
    }

    /// Instantiate the transformer with the project's tool settings.
    pub fn build(&self, tools: &ToolsConfig, project_name: &str) -> Result<Box<dyn Transformer>> {
        Ok(match self {
            Self::Styles => Box::new(StyleCompiler::new(
                tools.autoprefix.clone(),
                &tools.browsers,
            )?),
            Self::Scripts => Box::new(ScriptMinifier::new(tools.scripts.clone())),
            Self::Images => Box::new(ImageOptimizer::new(tools.images.clone())),
            Self::Templates { partials } => {
                let data = serde_json::json!({ "project": { "name": project_name } });
                Box::new(TemplateRenderer::new(partials, data)?)
            }
            Self::Html => Box::new(HtmlMinifier::new()),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `styles/main.scss` + (`.min`, `css`) → `styles/main.min.css`.
pub(crate) fn with_suffix(rel: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    rel.with_file_name(format!("{stem}{suffix}.{extension}"))
}

/// Pipe `input` through an external program (stdin → stdout).
pub(crate) fn run_tool(tool: &ToolCommand, path: &Path, input: &[u8]) -> Result<Vec<u8>> {
    let mut child = Command::new(&tool.program)
        .args(&tool.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ThemekitError::ToolMissing {
                program: tool.program.clone(),
            },
            _ => ThemekitError::transform(&tool.program, path, e.to_string()),
        })?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ThemekitError::transform(&tool.program, path, "stdin unavailable"))?;

    // Feed stdin from a separate thread so a full stdout pipe cannot deadlock us.
    let (output, written) = std::thread::scope(|scope| {
        let writer = scope.spawn(move || stdin.write_all(input));
        let output = child.wait_with_output();
        (output, writer.join())
    });

    let output = output.map_err(|e| ThemekitError::transform(&tool.program, path, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ThemekitError::transform(
            &tool.program,
            path,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    match written {
        Ok(Ok(())) => {}
        // The tool may legitimately stop reading early; its exit status decides.
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
        Ok(Err(e)) => return Err(ThemekitError::transform(&tool.program, path, e.to_string())),
        Err(_) => {
            return Err(ThemekitError::transform(
                &tool.program,
                path,
                "stdin writer panicked",
            ));
        }
    }

    Ok(output.stdout)
}
