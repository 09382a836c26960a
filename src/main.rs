//! Foundation CLI
//!
//! Plans the baseline infrastructure of a cluster: storage provisioning,
//! load-balancing, ingress and certificates.

use clap::Parser;

use foundation::Cli;
use foundation_common::telemetry::{init_logging, TelemetryConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(TelemetryConfig {
        format: cli.log_format.into(),
        filter: None,
    })?;

    cli.run()?;
    Ok(())
}
