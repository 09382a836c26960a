//! Plan command - compute lifecycle plans without touching the cluster
//!
//! - `plan create`: creation waves plus every declared namespace and subsystem
//! - `plan update --previous <file>`: steps moving the previous stack to this one
//! - `plan destroy [--resource <id>]`: deletion waves, refused when protected

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use foundation_common::COMPONENT_TYPE;
use foundation_infra::config::CLOUDFLARE_API_TOKEN_KEY;
use foundation_infra::{NamespaceDeclaration, Plan, ResourceId, SubsystemDescriptor};

use super::{build, load_stack, write_json};
use crate::config::StackConfig;
use crate::{Result, StackArgs};

/// Compute a lifecycle plan
#[derive(Args, Debug)]
pub struct PlanArgs {
    #[command(subcommand)]
    pub command: PlanCommand,
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
    /// Plan creation of every resource
    Create,
    /// Plan the move from a previous stack file to the current one
    Update(UpdateArgs),
    /// Plan destruction of the composition or one resource
    Destroy(DestroyArgs),
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Stack file the composition is currently deployed from
    #[arg(long)]
    pub previous: PathBuf,
}

#[derive(Args, Debug)]
pub struct DestroyArgs {
    /// Single resource to destroy, e.g. `subsystem/metallb` or `namespace/metallb`
    #[arg(long)]
    pub resource: Option<ResourceId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateReport<'a> {
    component_type: &'static str,
    plan: Plan,
    namespaces: &'a [NamespaceDeclaration],
    subsystems: &'a [SubsystemDescriptor],
}

pub fn run(args: PlanArgs, stack: &StackArgs, out: &mut dyn Write) -> Result<()> {
    let config = load_stack(stack)?;
    match args.command {
        PlanCommand::Create => create(&config, out),
        PlanCommand::Update(update_args) => {
            let mut previous = StackConfig::load(&update_args.previous)?;
            // The token usually comes from the environment rather than either file
            if previous.raw().get(CLOUDFLARE_API_TOKEN_KEY).is_none() {
                if let Some(token) = &stack.cloudflare_api_token {
                    previous.set_cloudflare_api_token(token.clone());
                }
            }
            update(&previous, &config, out)
        }
        PlanCommand::Destroy(destroy_args) => destroy(&config, destroy_args.resource.as_ref(), out),
    }
}

fn create(config: &StackConfig, out: &mut dyn Write) -> Result<()> {
    let (_, foundation) = build(config)?;
    let plan = foundation.plan_create();
    info!(steps = plan.steps.len(), "Computed create plan");

    write_json(
        out,
        &CreateReport {
            component_type: COMPONENT_TYPE,
            plan,
            namespaces: foundation.namespaces(),
            subsystems: foundation.subsystems(),
        },
    )
}

fn update(previous: &StackConfig, current: &StackConfig, out: &mut dyn Write) -> Result<()> {
    let (_, before) = build(previous)?;
    let (_, after) = build(current)?;
    let plan = before.plan_update(&after)?;
    write_json(out, &plan)
}

fn destroy(config: &StackConfig, resource: Option<&ResourceId>, out: &mut dyn Write) -> Result<()> {
    let (_, foundation) = build(config)?;
    let plan = match resource {
        Some(id) => foundation.plan_destroy_resource(id)?,
        None => foundation.plan_destroy()?,
    };
    info!(steps = plan.steps.len(), "Computed destroy plan");
    write_json(out, &plan)
}
