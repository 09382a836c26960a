//! Foundation CLI library
//!
//! Loads stack configuration, builds the foundation composition and prints
//! its lifecycle plans and outputs as JSON for the reconciliation engine.

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use foundation_common::telemetry::LogFormat;
use foundation_common::Secret;

/// Foundation - baseline cluster infrastructure composition
#[derive(Parser, Debug)]
#[command(name = "foundation")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Log output format (logs go to stderr)
    #[arg(long, value_enum, default_value_t = LogFormatArg::Text, global = true)]
    pub log_format: LogFormatArg,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where configuration comes from
#[derive(Args, Debug, Clone)]
pub struct StackArgs {
    /// Stack configuration file
    #[arg(
        short = 'c',
        long = "config",
        default_value = "foundation.yaml",
        global = true
    )]
    pub config_file: PathBuf,

    /// Override a configuration value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    /// DNS provider API token for ACME DNS-01 challenges
    #[arg(long, env = "CLOUDFLARE_API_TOKEN", hide_env_values = true, global = true)]
    pub cloudflare_api_token: Option<Secret>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute a lifecycle plan for the composition
    Plan(commands::plan::PlanArgs),
    /// Print the composition's public outputs
    Outputs,
}

/// Log format selectable on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

impl Cli {
    /// Run the CLI command, writing results to stdout
    pub fn run(self) -> Result<()> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        match self.command {
            Commands::Plan(args) => commands::plan::run(args, &self.stack, &mut out),
            Commands::Outputs => commands::outputs::run(&self.stack, &mut out),
        }
    }
}
