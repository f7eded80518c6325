//! Task graph and pipeline orchestration for themekit.
//!
//! This crate ties the asset transformers, the WordPress scaffolder and the
//! deploy uploader together into named, dependency-ordered tasks
//! (e.g. `frontend:build`, `backend:install`).

pub mod fsops;
pub mod graph;
pub mod pipelines;
pub mod runner;

pub use graph::{PlannedStep, Step, TaskDef, TaskGraph, TaskKind};
pub use pipelines::{SERVE_MODES, builtin_graph, wordpress_archive_url};
pub use runner::{ProgressReporter, Runner, SilentProgress};
