//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use themekit_core::{ProgressReporter, Runner, SERVE_MODES, Step, TaskGraph, builtin_graph};
use themekit_deploy::{FtpConnector, load_credentials};
use themekit_shared::{
    ProjectConfig, ProjectLayout, RunReport, StepReport, config_file_path, init_config,
    load_config, load_config_from,
};

use crate::skeleton;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// themekit — build, serve and deploy WordPress themes.
#[derive(Parser)]
#[command(
    name = "themekit",
    version,
    about = "Build a static front-end and a WordPress theme from one source tree, serve it with live reload, and deploy changed files over FTP.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Project directory.
    #[arg(long, default_value = ".", global = true, env = "THEMEKIT_PROJECT")]
    pub project: PathBuf,

    /// Config file (defaults to <project>/themekit.toml).
    #[arg(long, global = true, env = "THEMEKIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Which half of the project a command acts on.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum Target {
    Frontend,
    Backend,
}

impl Target {
    fn prefix(self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one or more tasks in order.
    Run {
        /// Task names, e.g. `frontend:build` or `backend:install`.
        #[arg(required = true)]
        tasks: Vec<String>,

        /// Plan uploads in deploy steps without sending anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// List available tasks.
    List,

    /// Start the dev server with live reload.
    Start {
        #[arg(value_enum)]
        target: Target,
    },

    /// Build and upload changed files.
    Deploy {
        #[arg(value_enum)]
        target: Target,

        /// Show what would be uploaded without uploading.
        #[arg(long)]
        dry_run: bool,
    },

    /// Scaffold a new project.
    Init {
        /// Directory to create (defaults to the project directory).
        dir: Option<PathBuf>,

        /// Theme name (defaults to the directory name).
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "warn,themekit=info",
        1 => "warn,themekit=debug",
        _ => "info,themekit=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run { ref tasks, dry_run } => cmd_run(&cli, tasks, dry_run).await,
        Command::List => cmd_list(&cli),
        Command::Start { target } => cmd_start(&cli, target).await,
        Command::Deploy { target, dry_run } => {
            let task = format!("{}:deploy", target.prefix());
            cmd_run(&cli, &[task], dry_run).await
        }
        Command::Init { ref dir, ref name } => cmd_init(&cli, dir.as_deref(), name.as_deref()),
        Command::Config { ref action } => match action {
            ConfigAction::Init => cmd_config_init(&cli),
            ConfigAction::Show => cmd_config_show(&cli),
        },
    }
}

// ---------------------------------------------------------------------------
// Project loading
// ---------------------------------------------------------------------------

/// Config, layout and task graph of the selected project.
struct Project {
    config: ProjectConfig,
    layout: ProjectLayout,
    graph: TaskGraph,
}

fn project_dir(cli: &Cli) -> Result<PathBuf> {
    std::fs::canonicalize(&cli.project)
        .wrap_err_with(|| format!("project directory '{}' not found", cli.project.display()))
}

fn load_project(cli: &Cli) -> Result<Project> {
    let dir = project_dir(cli)?;
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config(&dir)?,
    };
    let layout = ProjectLayout::resolve(&config, &dir);
    let graph = builtin_graph(&config, &layout)?;
    Ok(Project {
        config,
        layout,
        graph,
    })
}

fn runner_for(project: &Project, tasks: &[String], dry_run: bool) -> Result<Runner> {
    let mut runner = Runner::new(project.config.clone(), project.layout.clone()).dry_run(dry_run);

    let mut deploys = false;
    for task in tasks {
        deploys |= project
            .graph
            .plan(task)?
            .iter()
            .any(|p| matches!(p.step, Step::Deploy { .. }));
    }

    if deploys {
        let deploy = &project.config.deploy;
        let path = project.layout.project_dir.join(&deploy.credentials_file);
        let credentials = load_credentials(&path, &deploy.password_env)?;
        runner = runner.with_connector(Arc::new(FtpConnector::new(credentials)));
    }

    Ok(runner)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(cli: &Cli, tasks: &[String], dry_run: bool) -> Result<()> {
    let project = load_project(cli)?;
    let runner = runner_for(&project, tasks, dry_run)?;

    for task in tasks {
        info!(task, dry_run, "running task");
        let reporter = CliProgress::new();
        let report = runner.run(&project.graph, task, &reporter).await?;
        print_summary(&report, dry_run);
    }

    Ok(())
}

fn print_summary(report: &RunReport, dry_run: bool) {
    println!();
    println!("  {} finished", report.task);
    println!("  Run:    {}", report.run_id);
    println!("  Steps:  {}", report.steps.len());
    if dry_run {
        println!("  Files:  {} (dry run, nothing uploaded)", report.output_count());
    } else {
        println!("  Files:  {}", report.output_count());
    }
    println!("  Time:   {:.1}s", report.elapsed.as_secs_f64());
    println!();
}

fn cmd_list(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let width = project
        .graph
        .names()
        .map(|(name, _)| name.len())
        .chain(SERVE_MODES.iter().map(|(name, _)| name.len()))
        .max()
        .unwrap_or(0);

    println!("Tasks ({}):", project.layout.theme_name);
    for (name, description) in project.graph.names() {
        println!("  {name:<width$}  {description}");
    }
    println!();
    println!("Dev server (themekit start frontend|backend):");
    for (name, description) in SERVE_MODES {
        println!("  {name:<width$}  {description}");
    }
    Ok(())
}

async fn cmd_start(cli: &Cli, target: Target) -> Result<()> {
    let project = load_project(cli)?;
    let runner = Runner::new(project.config.clone(), project.layout.clone());
    let reporter = CliProgress::new();

    info!(target = target.prefix(), "starting dev server");
    match target {
        Target::Frontend => {
            themekit_server::frontend_start(runner, project.graph, &reporter).await?;
        }
        Target::Backend => {
            themekit_server::backend_start(runner, project.graph, &reporter).await?;
        }
    }
    Ok(())
}

fn cmd_init(cli: &Cli, dir: Option<&Path>, name: Option<&str>) -> Result<()> {
    let dir = dir.unwrap_or(&cli.project);
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("cannot create '{}'", dir.display()))?;
    let dir = std::fs::canonicalize(dir)?;

    let name = match name {
        Some(name) => name.to_string(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| eyre!("cannot derive a theme name from '{}'; pass --name", dir.display()))?,
    };

    let written = skeleton::scaffold(&dir, &name)?;
    info!(dir = %dir.display(), files = written.len(), "project scaffolded");

    println!();
    println!("  Project '{name}' created in {}", dir.display());
    println!("  Files:  {}", written.len());
    println!();
    println!("  Next:   themekit start frontend");
    println!("          themekit run backend:install");
    println!();
    Ok(())
}

fn cmd_config_init(cli: &Cli) -> Result<()> {
    let dir = project_dir(cli)?;
    let path = init_config(&dir, None)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let project = load_project(cli)?;
    let source = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&project.layout.project_dir));

    println!("# source: {}", source.display());
    println!("# theme:  {}", project.layout.theme_name);
    println!("{}", toml::to_string_pretty(&project.config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn step_done(&self, report: &StepReport) {
        self.spinner.println(format!(
            "  ✓ {:<16} {:>4} file(s)  {:.2}s",
            report.name,
            report.outputs.len(),
            report.elapsed.as_secs_f64()
        ));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        // A failed run never reaches `done`.
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
