//! themekit CLI — build tool for static front-ends and WordPress themes.
//!
//! Compiles Sass, minifies scripts and HTML, renders Handlebars templates,
//! installs WordPress locally, serves everything with live reload and deploys
//! changed files over FTP.

mod commands;
mod skeleton;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
