//! CLI commands

use std::io::Write;

use serde::Serialize;
use tracing::info;

use foundation_infra::{CompositionInput, Foundation};

use crate::config::StackConfig;
use crate::{Error, Result, StackArgs};

pub mod outputs;
pub mod plan;

/// Load the stack file and layer the token and `--set` overrides on top
pub fn load_stack(args: &StackArgs) -> Result<StackConfig> {
    let mut config = StackConfig::load(&args.config_file)?;
    if let Some(token) = &args.cloudflare_api_token {
        config.set_cloudflare_api_token(token.clone());
    }
    config.apply_overrides(args.overrides.as_slice())?;
    Ok(config)
}

/// Validate configuration and build the composition
pub fn build(config: &StackConfig) -> Result<(CompositionInput, Foundation)> {
    let input = config.input()?;
    let options = config.options()?;
    let foundation = Foundation::new(&input, options)?;
    info!(
        source = ?config.source(),
        subsystems = foundation.subsystems().len(),
        "Built composition"
    );
    Ok((input, foundation))
}

/// Write a value as pretty JSON followed by a newline
pub fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{}", json).map_err(Error::Output)
}
