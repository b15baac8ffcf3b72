//! Fnforge Capabilities - Built-in capability registry and tool dispatcher
//!
//! Capabilities are the only way the agent mutates project state. Each one
//! declares its schema, timeout class, destructiveness and target keys; the
//! dispatcher enforces those declarations uniformly so no handler has to.

pub mod capabilities;
pub mod dispatcher;
pub mod registry;

pub use dispatcher::{validate_arguments, Dispatcher, DispatcherConfig};
pub use registry::{Capability, CapabilityClass, CapabilityRegistry};

use fnforge_core::{ProjectContext, Result};
use fnforge_plan::PlanEngine;
use fnforge_sync::SyncEngine;
use std::sync::Arc;

/// Build the full built-in registry over the given collaborators.
///
/// The plan engine must share the dispatcher's target lock table
/// (`Dispatcher::with_target_locks` / `PlanEngine::with_target_locks`) so
/// plan application excludes direct edits of the same functions.
pub fn builtin_registry(
    ctx: ProjectContext,
    plans: Arc<PlanEngine>,
    sync: Arc<SyncEngine>,
) -> Result<CapabilityRegistry> {
    use crate::capabilities::*;

    let mut registry = CapabilityRegistry::new();

    registry.register(function::CreateFunction::new(ctx.clone()))?;
    registry.register(function::UpdateFunction::new(ctx.clone()))?;
    registry.register(function::DeleteFunction::new(ctx.clone()))?;
    registry.register(function::GetFunction::new(ctx.clone()))?;
    registry.register(function::ListFunctions::new(ctx.clone()))?;

    registry.register(site::WriteSiteFile::new(ctx.clone()))?;
    registry.register(site::DeleteSiteFile::new(ctx.clone()))?;

    registry.register(files::UploadFile::new(ctx.clone()))?;
    registry.register(files::DeleteFile::new(ctx.clone()))?;

    registry.register(deps::AddDependency::new(ctx.clone()))?;
    registry.register(deps::RemoveDependency::new(ctx.clone()))?;
    registry.register(deps::ListDependencies::new(ctx.clone()))?;

    registry.register(env::SetEnvVar::new(ctx.clone()))?;
    registry.register(env::UnsetEnvVar::new(ctx.clone()))?;
    registry.register(env::ListEnvVars::new(ctx.clone()))?;

    registry.register(database::GetSchema::new(ctx.clone()))?;
    registry.register(database::UpdateSchema::new(ctx.clone()))?;
    registry.register(database::RunQuery::new(ctx.clone()))?;

    registry.register(testing::RunTest::new(ctx))?;

    registry.register(plan::DecomposeFunction::new(plans.clone()))?;
    registry.register(plan::MergeFunctions::new(plans.clone()))?;
    registry.register(plan::ConfirmPlan::new(plans))?;

    registry.register(git::PreviewPull::new(sync.clone()))?;
    registry.register(git::Pull::new(sync.clone()))?;
    registry.register(git::PreviewPush::new(sync.clone()))?;
    registry.register(git::Push::new(sync))?;

    Ok(registry)
}
