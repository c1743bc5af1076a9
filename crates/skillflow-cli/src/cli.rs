use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the skillflow CLI
#[derive(Parser, Debug)]
#[command(name = "skillflow")]
#[command(about = "Inspect skill coordination readiness and plan workflows", long_about = None)]
pub struct Cli {
    /// Configuration file; defaults are used when omitted
    #[arg(short, long, global = true, help = "Path to a skillflow config.toml")]
    pub config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report coordination capabilities of a project
    #[command(about = "Report coordination capabilities of a project")]
    Status {
        #[arg(
            short,
            long,
            help = "Project root directory [default: detection.project_root from config]"
        )]
        project: Option<PathBuf>,

        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },

    /// Validate a workflow file and show how it would be scheduled
    #[command(about = "Validate a workflow file and show its execution plan")]
    Plan {
        #[arg(help = "Workflow definition in TOML")]
        file: PathBuf,

        #[arg(long, help = "Print the plan as JSON")]
        json: bool,
    },
}
