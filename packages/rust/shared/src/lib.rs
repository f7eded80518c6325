//! Shared types, error model, and configuration for themekit.
//!
//! This crate is the foundation depended on by all other themekit crates.
//! It provides:
//! - [`ThemekitError`] — the unified error type
//! - Domain types ([`RunId`], [`RunReport`], [`StepReport`])
//! - Configuration ([`ProjectConfig`], [`ProjectLayout`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BackendConfig, BackendPaths, CONFIG_FILE_NAME, CustomTask, DeployConfig, FrontendConfig, FrontendPaths,
    ProjectConfig, ProjectLayout, ProjectSection, ServerConfig, ToolCommand, ToolsConfig,
    config_file_path, init_config, load_config, load_config_from, theme_name,
};
pub use error::{Result, ThemekitError};
pub use types::{RunId, RunReport, StepReport};
