//! Development server for themekit projects.
//!
//! Two modes share the same live-reload machinery:
//! - `frontend:start`: build once, serve `front-end/dist`, rebuild on change
//! - `backend:start`: proxy the local WordPress server, sync the theme on change
//!
//! Every HTML response gets a small script that opens a WebSocket to
//! [`LIVERELOAD_PATH`] and reloads the page when a rebuild succeeds.

pub mod app;
pub mod livereload;
pub mod proxy;
pub mod watch;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};
use url::Url;

use themekit_core::{ProgressReporter, Runner, TaskGraph};
use themekit_shared::{Result, ThemekitError};

pub use app::{Mode, resolve_path, router};
pub use livereload::{CLIENT_SCRIPT, LIVERELOAD_PATH, LiveReload, inject};
pub use watch::{next_batch, rebuild_loop, watch_dir};

/// Everything needed to run one dev server session.
struct Session {
    mode: Mode,
    watch: PathBuf,
    task: String,
}

/// Build the front-end, then serve `dist` and rebuild it on source changes.
#[instrument(skip_all)]
pub async fn frontend_start(
    runner: Runner,
    graph: TaskGraph,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let task = "frontend:build";
    runner.run(&graph, task, progress).await?;

    let layout = runner.layout();
    let session = Session {
        mode: Mode::Static {
            root: layout.frontend.dist.clone(),
        },
        watch: layout.frontend.src.clone(),
        task: task.to_string(),
    };
    serve(runner, graph, session).await
}

/// Sync the theme, then proxy the WordPress server and re-sync on changes.
#[instrument(skip_all)]
pub async fn backend_start(
    runner: Runner,
    graph: TaskGraph,
    progress: &dyn ProgressReporter,
) -> Result<()> {
    let task = "wp:live";
    runner.run(&graph, task, progress).await?;

    let target = &runner.config().backend.proxy;
    let upstream = Url::parse(target)
        .map_err(|e| ThemekitError::config(format!("invalid backend.proxy '{target}': {e}")))?;
    let client = proxy::client().map_err(|e| ThemekitError::Server(e.to_string()))?;

    let session = Session {
        mode: Mode::Proxy { upstream, client },
        watch: runner.layout().backend.src.clone(),
        task: task.to_string(),
    };
    serve(runner, graph, session).await
}

async fn serve(runner: Runner, graph: TaskGraph, session: Session) -> Result<()> {
    let server = &runner.config().server;
    let addr: SocketAddr = format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| ThemekitError::config(format!("invalid server address: {e}")))?;
    let quiet = Duration::from_millis(server.debounce_ms);

    let reload = LiveReload::new();
    let (_watcher, rx) = watch_dir(&session.watch)?;
    let rebuild = tokio::spawn(rebuild_loop(
        rx,
        quiet,
        runner.clone(),
        Arc::new(graph),
        session.task,
        reload.clone(),
    ));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ThemekitError::Server(format!("bind {addr}: {e}")))?;
    info!("dev server listening on http://{addr}");

    axum::serve(listener, router(session.mode, reload))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .map_err(|e| ThemekitError::Server(e.to_string()))?;

    rebuild.abort();
    Ok(())
}
