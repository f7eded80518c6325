//! Source watching with debounced rebuilds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use themekit_core::{Runner, SilentProgress, TaskGraph};
use themekit_shared::{Result, ThemekitError};

use crate::livereload::LiveReload;

/// Watch `dir` recursively, forwarding changed paths into the returned channel.
///
/// The watcher stops when the returned [`RecommendedWatcher`] is dropped.
pub fn watch_dir(dir: &Path) -> Result<(RecommendedWatcher, mpsc::Receiver<PathBuf>)> {
    let (tx, rx) = mpsc::channel(256);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                // Runs on the notify thread, outside the async runtime.
                if tx.blocking_send(path).is_err() {
                    return;
                }
            }
        }
        Err(e) => warn!(error = %e, "watch error"),
    })
    .map_err(|e| ThemekitError::Watch(e.to_string()))?;

    watcher
        .watch(dir, RecursiveMode::Recursive)
        .map_err(|e| ThemekitError::Watch(format!("{}: {e}", dir.display())))?;

    info!(dir = %dir.display(), "watching for changes");
    Ok((watcher, rx))
}

/// Wait for the next change, then keep collecting until `quiet` passes
/// without another one. `None` once the channel is closed and drained.
pub async fn next_batch(rx: &mut mpsc::Receiver<PathBuf>, quiet: Duration) -> Option<Vec<PathBuf>> {
    let first = rx.recv().await?;
    let mut batch = vec![first];

    loop {
        match tokio::time::timeout(quiet, rx.recv()).await {
            Ok(Some(path)) => {
                if !batch.contains(&path) {
                    batch.push(path);
                }
            }
            Ok(None) | Err(_) => break,
        }
    }
    Some(batch)
}

/// Run `task` after every debounced batch of changes and reload the browsers
/// on success. Failures are logged; the loop keeps going.
pub async fn rebuild_loop(
    mut rx: mpsc::Receiver<PathBuf>,
    quiet: Duration,
    runner: Runner,
    graph: Arc<TaskGraph>,
    task: String,
    reload: LiveReload,
) {
    while let Some(batch) = next_batch(&mut rx, quiet).await {
        info!(
            changed = batch.len(),
            first = %batch[0].display(),
            task = %task,
            "change detected, rebuilding"
        );

        match runner.run(&graph, &task, &SilentProgress).await {
            Ok(report) => {
                let clients = reload.reload();
                info!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    clients, "rebuilt"
                );
            }
            Err(e) => error!(error = %e, task = %task, "rebuild failed; waiting for the next change"),
        }
    }
}
