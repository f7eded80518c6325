//! Error types for themekit.
//!
//! Library crates use [`ThemekitError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all themekit operations.
#[derive(Debug, thiserror::Error)]
pub enum ThemekitError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network/HTTP error while downloading or proxying.
    #[error("network error: {0}")]
    Network(String),

    /// Task graph error (unknown task, cycle, duplicate definition).
    #[error("task error: {message}")]
    Task { message: String },

    /// An asset transformer rejected its input.
    #[error("{tool} failed on {path:?}: {message}")]
    Transform {
        tool: String,
        path: PathBuf,
        message: String,
    },

    /// A configured external program could not be started.
    #[error("external tool '{program}' not found; install it or change [tools] in themekit.toml")]
    ToolMissing { program: String },

    /// Archive unpacking error.
    #[error("archive error: {0}")]
    Archive(String),

    /// Remote upload error.
    #[error("deploy error: {0}")]
    Deploy(String),

    /// Dev server error (bind, serve).
    #[error("server error: {0}")]
    Server(String),

    /// Filesystem watcher error.
    #[error("watch error: {0}")]
    Watch(String),

    /// Data validation error (bad pattern, path outside root, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ThemekitError>;

impl ThemekitError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a task graph error.
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a transformer error tied to the input file.
    pub fn transform(
        tool: impl Into<String>,
        path: impl Into<PathBuf>,
        msg: impl Into<String>,
    ) -> Self {
        Self::Transform {
            tool: tool.into(),
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ThemekitError::config("missing [frontend] root");
        assert_eq!(err.to_string(), "config error: missing [frontend] root");

        let err = ThemekitError::task("unknown task 'bogus'");
        assert!(err.to_string().contains("bogus"));

        let err = ThemekitError::transform("styles", "src/main.scss", "expected ';'");
        assert!(err.to_string().starts_with("styles failed on"));
    }

    #[test]
    fn tool_missing_names_program() {
        let err = ThemekitError::ToolMissing {
            program: "terser".into(),
        };
        assert!(err.to_string().contains("'terser'"));
    }
}
