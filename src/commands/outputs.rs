//! Outputs command - print what downstream stacks consume

use std::io::Write;

use serde::Serialize;

use foundation_common::COMPONENT_TYPE;
use foundation_infra::FoundationOutputs;

use super::{build, load_stack, write_json};
use crate::config::StackConfig;
use crate::{Result, StackArgs};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutputsReport<'a> {
    name: &'a str,
    component_type: &'static str,
    #[serde(flatten)]
    outputs: FoundationOutputs,
}

pub fn run(stack: &StackArgs, out: &mut dyn Write) -> Result<()> {
    let config = load_stack(stack)?;
    render(&config, out)
}

fn render(config: &StackConfig, out: &mut dyn Write) -> Result<()> {
    let (input, foundation) = build(config)?;
    let exports = config.exports(&input)?;

    write_json(
        out,
        &OutputsReport {
            name: foundation.name(),
            component_type: COMPONENT_TYPE,
            outputs: foundation.outputs(exports),
        },
    )
}
