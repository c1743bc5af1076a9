//! Command-line front end for skill coordination

use anyhow::Result;
use clap::Parser as _;
use std::io;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

mod cli;
mod handlers;
mod plan;

use cli::{Cli, Commands};
use handlers::{handle_plan, handle_status, load_config};

fn main() -> Result<()> {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "skillflow_coordination=info,skillflow_core=info,skillflow=info".into()
        }))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Status { project, json } => {
            let project_root = project.unwrap_or_else(|| config.detection.project_root.clone());
            handle_status(project_root, json)?;
        }
        Commands::Plan { file, json } => {
            handle_plan(&file, config.execution.default_mode, json)?;
        }
    }

    Ok(())
}
