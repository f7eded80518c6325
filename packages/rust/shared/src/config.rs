//! Project configuration for themekit.
//!
//! Config lives at `<project>/themekit.toml`. Every key has a default, so a
//! project with no config file builds with the conventional
//! `front-end/` + `back-end/` layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThemekitError};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "themekit.toml";

/// Theme name used when neither the config nor the directory supplies one.
const FALLBACK_THEME_NAME: &str = "theme";

// ---------------------------------------------------------------------------
// Config structs (matching themekit.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectSection,

    /// Static front-end bundle.
    #[serde(default)]
    pub frontend: FrontendConfig,

    /// WordPress back-end.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Dev server and watcher.
    #[serde(default)]
    pub server: ServerConfig,

    /// External programs invoked by transformers.
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Deploy settings.
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Project-defined task aliases, run in series.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tasks: BTreeMap<String, CustomTask>,
}

/// `[project]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Theme name; defaults to the project directory name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `[frontend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrontendConfig {
    /// Front-end root, relative to the project directory.
    #[serde(default = "default_frontend_root")]
    pub root: PathBuf,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            root: default_frontend_root(),
        }
    }
}

fn default_frontend_root() -> PathBuf {
    PathBuf::from("front-end")
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Back-end root, relative to the project directory.
    #[serde(default = "default_backend_root")]
    pub root: PathBuf,

    /// Base URL WordPress is downloaded from.
    #[serde(default = "default_wordpress_url")]
    pub wordpress_url: String,

    /// Archive name appended to `wordpress_url`.
    #[serde(default = "default_wordpress_version")]
    pub wordpress_version: String,

    /// Local PHP server the dev proxy forwards to.
    #[serde(default = "default_proxy")]
    pub proxy: String,

    /// Keep downloaded archives in the user cache directory.
    #[serde(default = "default_true")]
    pub cache_downloads: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            root: default_backend_root(),
            wordpress_url: default_wordpress_url(),
            wordpress_version: default_wordpress_version(),
            proxy: default_proxy(),
            cache_downloads: true,
        }
    }
}

fn default_backend_root() -> PathBuf {
    PathBuf::from("back-end")
}
fn default_wordpress_url() -> String {
    "https://wordpress.org".into()
}
fn default_wordpress_version() -> String {
    "latest.zip".into()
}
fn default_proxy() -> String {
    "http://localhost:8888".into()
}
fn default_true() -> bool {
    true
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface the dev server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Dev server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Quiet period after the last file event before rebuilding.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}
fn default_debounce_ms() -> u64 {
    200
}

/// An external program plus its fixed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,
    /// Arguments passed before any per-file arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// `[tools]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// JavaScript minifier, reads stdin and writes stdout.
    #[serde(default = "default_scripts_tool")]
    pub scripts: ToolCommand,

    /// Browserslist queries for the built-in vendor prefixing. Empty disables it.
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    /// External CSS post-processor, stdin to stdout; replaces the built-in
    /// prefixing when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoprefix: Option<ToolCommand>,

    /// Optional image optimizer, stdin to stdout; replaces the built-in PNG pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ToolCommand>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            scripts: default_scripts_tool(),
            browsers: default_browsers(),
            autoprefix: None,
            images: None,
        }
    }
}

fn default_browsers() -> Vec<String> {
    vec!["last 2 versions".into()]
}

fn default_scripts_tool() -> ToolCommand {
    ToolCommand::new("terser", &["--compress", "--mangle"])
}

/// `[deploy]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// JSON credentials file, relative to the project directory.
    #[serde(default = "default_credentials_file")]
    pub credentials_file: PathBuf,

    /// Env var that overrides the password from the credentials file.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            credentials_file: default_credentials_file(),
            password_env: default_password_env(),
        }
    }
}

fn default_credentials_file() -> PathBuf {
    PathBuf::from("credentials.json")
}
fn default_password_env() -> String {
    "THEMEKIT_FTP_PASSWORD".into()
}

/// A `[tasks.<name>]` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Task names run one after another.
    pub series: Vec<String>,
}

// ---------------------------------------------------------------------------
// Resolved layout (config + project directory)
// ---------------------------------------------------------------------------

/// Absolute front-end paths.
#[derive(Debug, Clone)]
pub struct FrontendPaths {
    pub root: PathBuf,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub assets: PathBuf,
    pub vendors: PathBuf,
    pub styles: PathBuf,
    pub scripts: PathBuf,
    pub images: PathBuf,
    pub templates: PathBuf,
    pub partials: PathBuf,
}

/// Absolute back-end paths.
#[derive(Debug, Clone)]
pub struct BackendPaths {
    pub root: PathBuf,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub server: PathBuf,
    pub tmp: PathBuf,
    /// `server/wp-content/themes/<theme>`
    pub theme_dir: PathBuf,
    /// `dist/wp-content/themes/<theme>`
    pub dist_theme_dir: PathBuf,
}

/// Every path the pipelines touch, resolved against the project directory.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub project_dir: PathBuf,
    pub theme_name: String,
    pub frontend: FrontendPaths,
    pub backend: BackendPaths,
}

impl ProjectLayout {
    /// Resolve the layout for `project_dir` under `config`.
    pub fn resolve(config: &ProjectConfig, project_dir: &Path) -> Self {
        let theme_name = theme_name(config, project_dir);

        let fe_root = project_dir.join(&config.frontend.root);
        let fe_src = fe_root.join("src");
        let frontend = FrontendPaths {
            dist: fe_root.join("dist"),
            assets: fe_src.join("assets"),
            vendors: fe_src.join("vendors"),
            styles: fe_src.join("styles"),
            scripts: fe_src.join("scripts"),
            images: fe_src.join("images"),
            templates: fe_src.join("templates"),
            partials: fe_src.join("templates").join("partials"),
            src: fe_src,
            root: fe_root,
        };

        let be_root = project_dir.join(&config.backend.root);
        let server = be_root.join("server");
        let dist = be_root.join("dist");
        let backend = BackendPaths {
            src: be_root.join("src"),
            tmp: be_root.join("tmp"),
            theme_dir: server.join("wp-content").join("themes").join(&theme_name),
            dist_theme_dir: dist.join("wp-content").join("themes").join(&theme_name),
            server,
            dist,
            root: be_root,
        };

        Self {
            project_dir: project_dir.to_path_buf(),
            theme_name,
            frontend,
            backend,
        }
    }
}

/// The theme name: `[project] name`, else the project directory name.
pub fn theme_name(config: &ProjectConfig, project_dir: &Path) -> String {
    config
        .project
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| {
            project_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| FALLBACK_THEME_NAME.to_string())
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the config file inside a project directory.
pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}

/// Load the project config. Returns defaults if the file does not exist.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig> {
    let path = config_file_path(project_dir);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(ProjectConfig::default());
    }

    load_config_from(&path)
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<ProjectConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ThemekitError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ThemekitError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into `project_dir`.
/// Refuses to overwrite an existing file. Returns the path written.
pub fn init_config(project_dir: &Path, name: Option<&str>) -> Result<PathBuf> {
    let path = config_file_path(project_dir);
    if path.exists() {
        return Err(ThemekitError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    std::fs::create_dir_all(project_dir).map_err(|e| ThemekitError::io(project_dir, e))?;

    let mut config = ProjectConfig::default();
    config.project.name = name.map(String::from);
    let content =
        toml::to_string_pretty(&config).map_err(|e| ThemekitError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ThemekitError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
