//! Halt/resume controller
//!
//! When an activity asks to halt, the controller first tries an immediate
//! self-resume (the first pass of the attempt). Only when that budget is
//! spent does it commit to a real suspension: the activity joins the
//! blocking set and the workflow becomes Halted.

use crate::application::invoker::{ActivityInvoker, ActivityOutcome};
use crate::config::EngineConfig;
use crate::domain::activity::ActivityId;
use crate::domain::workflow::Workflow;
use crate::CoreError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

/// Per-attempt execution state
///
/// One context exists per execution attempt and is never shared between
/// attempts.
#[derive(Debug)]
pub struct ExecutionContext<'w> {
    workflow: &'w mut Workflow,
    is_first_pass: bool,
    first_pass_resumes: usize,
    max_first_pass_resumes: usize,
    executions: usize,
    max_executions: usize,
}

impl<'w> ExecutionContext<'w> {
    /// Begin an attempt over the given workflow
    pub fn new(workflow: &'w mut Workflow, config: &EngineConfig) -> Self {
        Self {
            workflow,
            is_first_pass: config.max_first_pass_resumes > 0,
            first_pass_resumes: 0,
            max_first_pass_resumes: config.max_first_pass_resumes,
            executions: 0,
            max_executions: config.max_activity_executions,
        }
    }

    /// The workflow being executed
    #[inline]
    pub fn workflow(&self) -> &Workflow {
        self.workflow
    }

    /// The workflow being executed, mutably
    #[inline]
    pub fn workflow_mut(&mut self) -> &mut Workflow {
        self.workflow
    }

    /// Whether a halt would still trigger an immediate self-resume
    #[inline]
    pub fn is_first_pass(&self) -> bool {
        self.is_first_pass
    }

    /// Override the first-pass flag
    pub fn set_first_pass(&mut self, is_first_pass: bool) {
        self.is_first_pass = is_first_pass;
    }

    /// Activity executions and resumes performed so far in this attempt
    #[inline]
    pub fn executions(&self) -> usize {
        self.executions
    }

    /// Count one execution against the attempt's bound
    pub(crate) fn record_execution(&mut self) -> Result<(), CoreError> {
        if self.executions >= self.max_executions {
            return Err(CoreError::ActivityExecutionError(format!(
                "Execution attempt exceeded {} activity executions",
                self.max_executions
            )));
        }
        self.executions += 1;
        Ok(())
    }

    fn record_self_resume(&mut self) {
        self.first_pass_resumes += 1;
        self.is_first_pass = self.first_pass_resumes < self.max_first_pass_resumes;
    }
}

/// What the attempt should do after an outcome has been applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltResolution {
    /// Keep going with these activities, in order
    Scheduled(Vec<ActivityId>),
    /// The workflow committed to a suspension
    Halted,
    /// The workflow finished
    Finished,
    /// The workflow faulted
    Faulted,
}

/// Applies activity outcomes to the workflow, governing halts
#[derive(Debug, Clone, Default)]
pub struct HaltController;

impl HaltController {
    /// Create a controller
    pub fn new() -> Self {
        Self
    }

    /// Apply the outcome of executing or resuming `activity_id`
    ///
    /// Halt outcomes produced during the first pass are resumed in place and
    /// the new outcome is applied in turn; the loop is bounded by the
    /// attempt's self-resume budget. Execution errors fault the workflow
    /// instead of being returned; only cancellation and invalid state
    /// transitions surface as `Err`.
    pub async fn resolve(
        &self,
        invoker: &dyn ActivityInvoker,
        ctx: &mut ExecutionContext<'_>,
        activity_id: &ActivityId,
        outcome: Result<ActivityOutcome, CoreError>,
        cancel: &CancellationToken,
    ) -> Result<HaltResolution, CoreError> {
        let mut outcome = outcome;

        loop {
            match outcome {
                Err(CoreError::Cancelled(reason)) => return Err(CoreError::Cancelled(reason)),
                Err(err) => return fault(ctx, activity_id, err.to_string()),
                Ok(ActivityOutcome::Fault(message)) => return fault(ctx, activity_id, message),
                Ok(ActivityOutcome::Finish) => {
                    ctx.workflow_mut().finish()?;
                    return Ok(HaltResolution::Finished);
                }
                Ok(ActivityOutcome::Continue { endpoints, output }) => {
                    if output.is_some() {
                        ctx.workflow_mut().set_last_result(output);
                    }
                    let graph = ctx.workflow().graph();
                    let scheduled: Vec<ActivityId> = endpoints
                        .iter()
                        .flat_map(|endpoint| graph.outbound(activity_id, endpoint))
                        .cloned()
                        .collect();
                    trace!(
                        activity_id = %activity_id,
                        scheduled = scheduled.len(),
                        "Activity continued"
                    );
                    return Ok(HaltResolution::Scheduled(scheduled));
                }
                Ok(ActivityOutcome::Halt) if ctx.is_first_pass() => {
                    debug!(activity_id = %activity_id, "First pass halt, resuming immediately");
                    ctx.record_self_resume();
                    if let Err(err) = ctx.record_execution() {
                        return fault(ctx, activity_id, err.to_string());
                    }
                    if cancel.is_cancelled() {
                        return Err(CoreError::Cancelled(format!(
                            "resume of activity {}",
                            activity_id
                        )));
                    }
                    outcome = invoker.resume_activity(ctx, activity_id, cancel).await;
                }
                Ok(ActivityOutcome::Halt) => {
                    ctx.workflow_mut().halt(activity_id)?;
                    return Ok(HaltResolution::Halted);
                }
            }
        }
    }
}

fn fault(
    ctx: &mut ExecutionContext<'_>,
    activity_id: &ActivityId,
    message: String,
) -> Result<HaltResolution, CoreError> {
    error!(activity_id = %activity_id, error = %message, "Activity faulted");
    ctx.workflow_mut().fault(message, Some(activity_id.clone()))?;
    Ok(HaltResolution::Faulted)
}
