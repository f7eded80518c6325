//! File selection and asset transformers.
//!
//! This crate provides:
//! - [`FileSet`] — glob-filtered, sorted file selection under a root
//! - [`transformers`] — the [`Transformer`] trait and built-ins for styles,
//!   scripts, images, templates, and HTML
//! - [`apply`] — run a transformer over a file set into a destination

pub mod fileset;
pub mod transformers;

pub use fileset::FileSet;
pub use transformers::{
    HtmlMinifier, ImageOptimizer, ScriptMinifier, StyleCompiler, TemplateRenderer, Transformer,
    TransformerKind, apply,
};
