//! Step engine: runs workflow steps in order and persists each step's log.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::catalog::WorkflowId;
use crate::core::types::ConversationLog;
use crate::io::config::GenConfig;
use crate::io::console::Console;
use crate::io::session::Session;
use crate::io::store::Stores;

/// Body of a step.
pub type StepFn = fn(&StepContext<'_>) -> Result<ConversationLog>;

/// A named unit of work. The name keys the persisted log, so it must be unique.
#[derive(Clone, Copy)]
pub struct Step {
    pub name: &'static str,
    pub run: StepFn,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// Everything a step may touch.
pub struct StepContext<'a> {
    pub session: &'a dyn Session,
    pub stores: &'a Stores,
    pub console: &'a dyn Console,
    pub config: &'a GenConfig,
}

/// Run `steps` in order, saving each log under the step name as soon as the
/// step returns. The first failing step aborts the rest; artifacts already
/// written stay.
pub fn run_steps(steps: &[Step], ctx: &StepContext<'_>) -> Result<()> {
    for step in steps {
        run_step(*step, ctx)?;
    }
    Ok(())
}

#[instrument(skip_all, fields(step = step.name))]
fn run_step(step: Step, ctx: &StepContext<'_>) -> Result<()> {
    info!("running step");
    let log = (step.run)(ctx).with_context(|| format!("step '{}' failed", step.name))?;
    ctx.stores
        .save_log(step.name, &log)
        .with_context(|| format!("persist log of step '{}'", step.name))?;
    info!(turns = log.len(), "step finished");
    Ok(())
}

/// Run a catalog workflow.
#[instrument(skip_all, fields(workflow = %workflow))]
pub fn run_workflow(workflow: WorkflowId, ctx: &StepContext<'_>) -> Result<()> {
    info!("starting workflow");
    run_steps(workflow.steps(), ctx)
}
