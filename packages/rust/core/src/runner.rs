//! Sequential plan execution.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{Instrument, info, info_span, warn};

use themekit_assets::{FileSet, apply};
use themekit_deploy::Connector;
use themekit_shared::{ProjectConfig, ProjectLayout, Result, RunId, RunReport, StepReport, ThemekitError};
use themekit_wordpress::DownloadOptions;

use crate::fsops;
use crate::graph::{Step, TaskGraph};

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before each step starts.
    fn phase(&self, name: &str);
    /// Called after each step succeeds.
    fn step_done(&self, report: &StepReport);
    /// Called when the whole run succeeds.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn step_done(&self, _report: &StepReport) {}
    fn done(&self, _report: &RunReport) {}
}

/// Executes planned steps for one project.
#[derive(Clone)]
pub struct Runner {
    config: Arc<ProjectConfig>,
    layout: Arc<ProjectLayout>,
    connector: Option<Arc<dyn Connector>>,
    dry_run: bool,
}

impl Runner {
    pub fn new(config: ProjectConfig, layout: ProjectLayout) -> Self {
        Self {
            config: Arc::new(config),
            layout: Arc::new(layout),
            connector: None,
            dry_run: false,
        }
    }

    /// Deploy target used by [`Step::Deploy`].
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Plan deploys without uploading.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    /// Plan `task` in `graph` and run every step in order.
    ///
    /// The first failing step aborts the run; later steps do not start.
    pub async fn run(
        &self,
        graph: &TaskGraph,
        task: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let plan = graph.plan(task)?;
        let run_id = RunId::new();
        let span = info_span!("run", %run_id, task);

        async {
            let start = Instant::now();
            info!(steps = plan.len(), "starting run");

            let mut steps = Vec::with_capacity(plan.len());
            for (i, planned) in plan.iter().enumerate() {
                progress.phase(&planned.to_string());
                let step_start = Instant::now();

                let outputs = self.execute(&planned.step).await.map_err(|e| {
                    warn!(
                        task = %planned.task,
                        step = i + 1,
                        skipped = plan.len() - i - 1,
                        error = %e,
                        "step failed, aborting run"
                    );
                    e
                })?;

                let report = StepReport {
                    name: planned.task.clone(),
                    outputs,
                    elapsed: step_start.elapsed(),
                };
                info!(
                    task = %report.name,
                    outputs = report.outputs.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "step done"
                );
                progress.step_done(&report);
                steps.push(report);
            }

            let report = RunReport {
                run_id,
                task: task.to_string(),
                steps,
                elapsed: start.elapsed(),
            };
            info!(
                outputs = report.output_count(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "run complete"
            );
            progress.done(&report);
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn execute(&self, step: &Step) -> Result<Vec<PathBuf>> {
        match step.clone() {
            Step::Clean { paths } => fsops::clean(&paths),
            Step::Copy {
                from,
                pattern,
                dests,
            } => fsops::copy_tree(&from, &pattern, &dests),
            Step::RenameExtension { dir, from, to } => fsops::rename_extension(&dir, &from, &to),
            Step::Transform {
                transformer,
                src,
                pattern,
                dest,
            } => {
                let tools = self.config.tools.clone();
                let project = self.layout.theme_name.clone();
                blocking(move || {
                    let files = FileSet::collect(&src, &pattern)?;
                    let transformer = transformer.build(&tools, &project)?;
                    apply(transformer.as_ref(), &files, &dest)
                })
                .await
            }
            Step::Download { url, dest, cache } => {
                let opts = DownloadOptions {
                    cache_dir: (cache && self.config.backend.cache_downloads)
                        .then(themekit_wordpress::default_cache_dir)
                        .flatten(),
                    ..DownloadOptions::default()
                };
                let archive = themekit_wordpress::download(&url, &dest, &opts).await?;
                Ok(vec![archive])
            }
            Step::Extract { dir, dest, strip } => {
                blocking(move || {
                    let archives = themekit_wordpress::find_archives(&dir)?;
                    if archives.is_empty() {
                        return Err(ThemekitError::Archive(format!(
                            "no .zip archives found in {}",
                            dir.display()
                        )));
                    }
                    let mut written = Vec::new();
                    for archive in archives {
                        written.extend(themekit_wordpress::extract(&archive, &dest, strip)?);
                    }
                    Ok(written)
                })
                .await
            }
            Step::Deploy { root } => {
                let connector = self.connector.clone().ok_or_else(|| {
                    ThemekitError::config("deploy target not configured; check the credentials file")
                })?;
                let dry_run = self.dry_run;
                blocking(move || {
                    let report = themekit_deploy::deploy(&root, connector.as_ref(), dry_run)?;
                    Ok(report.uploaded.into_iter().map(PathBuf::from).collect())
                })
                .await
            }
        }
    }
}

/// Run CPU- or socket-bound work off the async executor.
async fn blocking<F>(f: F) -> Result<Vec<PathBuf>>
where
    F: FnOnce() -> Result<Vec<PathBuf>> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ThemekitError::task(format!("step aborted: {e}")))?
}
