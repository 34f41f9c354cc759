//! Workflow runner
//!
//! Drives execution attempts: a fresh run from the start activities, or a
//! resume of one blocking activity. Activities are processed in FIFO order;
//! every outcome goes through the [`HaltController`].

use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::application::halt::{ExecutionContext, HaltController, HaltResolution};
use crate::application::invoker::ActivityInvoker;
use crate::config::EngineConfig;
use crate::domain::activity::ActivityId;
use crate::domain::workflow::{Workflow, WorkflowStatus};
use crate::CoreError;

/// Runs execution attempts against a workflow
pub struct WorkflowRunner {
    invoker: Arc<dyn ActivityInvoker>,
    halt_controller: HaltController,
    config: EngineConfig,
}

impl WorkflowRunner {
    /// Create a runner with default configuration
    pub fn new(invoker: Arc<dyn ActivityInvoker>) -> Self {
        Self::with_config(invoker, EngineConfig::default())
    }

    /// Create a runner with explicit configuration
    pub fn with_config(invoker: Arc<dyn ActivityInvoker>, config: EngineConfig) -> Self {
        Self {
            invoker,
            halt_controller: HaltController::new(),
            config,
        }
    }

    /// Engine configuration in use
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start an Idle workflow and run it until it halts, faults or finishes
    ///
    /// On `Err(Cancelled)` the workflow is left mid-attempt and should be
    /// discarded; its last persisted document remains authoritative.
    #[instrument(skip_all, fields(workflow_id = %workflow.id()))]
    pub async fn run(
        &self,
        workflow: &mut Workflow,
        cancel: &CancellationToken,
    ) -> Result<WorkflowStatus, CoreError> {
        workflow.start()?;

        let start: VecDeque<ActivityId> = workflow
            .start_activities()
            .into_iter()
            .map(|activity| activity.id().clone())
            .collect();

        if start.is_empty() && workflow.graph().activity_count() > 0 {
            workflow.fault(
                "Workflow has no start activities: every activity is a connection target",
                None,
            )?;
            return Ok(workflow.status());
        }

        info!(start_activities = start.len(), "Running workflow");
        let mut ctx = ExecutionContext::new(workflow, &self.config);
        self.drain(&mut ctx, start, cancel).await
    }

    /// Deliver an external resume signal to a blocking activity and continue
    ///
    /// The resumed activity has already had its first pass, so a halt it
    /// reports now commits to suspension immediately.
    #[instrument(skip_all, fields(workflow_id = %workflow.id(), activity_id = %activity_id))]
    pub async fn resume(
        &self,
        workflow: &mut Workflow,
        activity_id: &ActivityId,
        cancel: &CancellationToken,
    ) -> Result<WorkflowStatus, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled(format!(
                "resume of activity {}",
                activity_id
            )));
        }
        let mut ctx = ExecutionContext::new(workflow, &self.config);
        ctx.set_first_pass(false);
        ctx.record_execution()?;
        ctx.workflow_mut().resume(activity_id)?;

        let outcome = self.invoker.resume_activity(&mut ctx, activity_id, cancel).await;
        let resolution = self
            .halt_controller
            .resolve(self.invoker.as_ref(), &mut ctx, activity_id, outcome, cancel)
            .await?;

        match resolution {
            HaltResolution::Scheduled(next) => {
                self.drain(&mut ctx, next.into_iter().collect(), cancel)
                    .await
            }
            HaltResolution::Halted | HaltResolution::Finished | HaltResolution::Faulted => {
                Ok(ctx.workflow().status())
            }
        }
    }

    async fn drain(
        &self,
        ctx: &mut ExecutionContext<'_>,
        mut queue: VecDeque<ActivityId>,
        cancel: &CancellationToken,
    ) -> Result<WorkflowStatus, CoreError> {
        while let Some(activity_id) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled(format!(
                    "execution of workflow {}",
                    ctx.workflow().id()
                )));
            }
            if let Err(err) = ctx.record_execution() {
                ctx.workflow_mut()
                    .fault(err.to_string(), Some(activity_id.clone()))?;
                return Ok(ctx.workflow().status());
            }

            debug!(activity_id = %activity_id, "Executing activity");
            let outcome = self.invoker.execute_activity(ctx, &activity_id, cancel).await;
            let resolution = self
                .halt_controller
                .resolve(self.invoker.as_ref(), ctx, &activity_id, outcome, cancel)
                .await?;

            match resolution {
                HaltResolution::Scheduled(next) => queue.extend(next),
                HaltResolution::Halted => {
                    if !queue.is_empty() {
                        debug!(dropped = queue.len(), "Dropping pending activities on halt");
                    }
                    return Ok(ctx.workflow().status());
                }
                HaltResolution::Finished | HaltResolution::Faulted => {
                    return Ok(ctx.workflow().status());
                }
            }
        }

        let workflow = ctx.workflow_mut();
        if workflow.status() == WorkflowStatus::Running {
            if workflow.blocking_activities().next().is_some() {
                workflow.suspend()?;
            } else {
                workflow.finish()?;
            }
        }
        Ok(workflow.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::invoker::ActivityOutcome;
    use crate::domain::activity::{Activity, PropertyBagActivity};
    use crate::domain::workflow::WorkflowMetadata;
    use crate::types::RuntimeValue;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Invoker replaying scripted outcomes per activity
    #[derive(Default)]
    struct ScriptedInvoker {
        executions: Mutex<HashMap<String, VecDeque<ActivityOutcome>>>,
        resumes: Mutex<HashMap<String, VecDeque<ActivityOutcome>>>,
        trace: Mutex<Vec<String>>,
    }

    impl ScriptedInvoker {
        fn on_execute(self, id: &str, outcome: ActivityOutcome) -> Self {
            self.executions
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_default()
                .push_back(outcome);
            self
        }

        fn on_resume(self, id: &str, outcome: ActivityOutcome) -> Self {
            self.resumes
                .lock()
                .unwrap()
                .entry(id.to_string())
                .or_default()
                .push_back(outcome);
            self
        }

        fn trace(&self) -> Vec<String> {
            self.trace.lock().unwrap().clone()
        }

        fn next(
            script: &Mutex<HashMap<String, VecDeque<ActivityOutcome>>>,
            id: &ActivityId,
        ) -> ActivityOutcome {
            script
                .lock()
                .unwrap()
                .get_mut(id.as_str())
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(ActivityOutcome::done)
        }
    }

    #[async_trait]
    impl ActivityInvoker for ScriptedInvoker {
        async fn execute_activity(
            &self,
            _ctx: &mut ExecutionContext<'_>,
            activity_id: &ActivityId,
            _cancel: &CancellationToken,
        ) -> Result<ActivityOutcome, CoreError> {
            self.trace.lock().unwrap().push(format!("execute:{}", activity_id));
            Ok(Self::next(&self.executions, activity_id))
        }

        async fn resume_activity(
            &self,
            _ctx: &mut ExecutionContext<'_>,
            activity_id: &ActivityId,
            _cancel: &CancellationToken,
        ) -> Result<ActivityOutcome, CoreError> {
            self.trace.lock().unwrap().push(format!("resume:{}", activity_id));
            Ok(Self::next(&self.resumes, activity_id))
        }
    }

    fn linear_workflow(ids: &[&str]) -> Workflow {
        let mut workflow = Workflow::new(WorkflowMetadata::definition("wf"));
        for id in ids {
            workflow
                .add_activity(Activity::new(*id, PropertyBagActivity::new("Step")))
                .unwrap();
        }
        for pair in ids.windows(2) {
            workflow.connect(pair[0], "done", pair[1]).unwrap();
        }
        workflow
    }

    #[tokio::test]
    async fn test_linear_run_finishes_in_order() {
        let invoker = Arc::new(ScriptedInvoker::default());
        let runner = WorkflowRunner::new(invoker.clone());
        let mut workflow = linear_workflow(&["a", "b", "c"]);

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Finished);
        assert_eq!(invoker.trace(), vec!["execute:a", "execute:b", "execute:c"]);
    }

    #[tokio::test]
    async fn test_first_pass_halt_does_not_suspend() {
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on_execute("wait", ActivityOutcome::Halt)
                .on_resume("wait", ActivityOutcome::done()),
        );
        let runner = WorkflowRunner::new(invoker.clone());
        let mut workflow = linear_workflow(&["wait", "after"]);

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Finished);
        assert_eq!(
            invoker.trace(),
            vec!["execute:wait", "resume:wait", "execute:after"]
        );
        assert!(workflow.halted_at().is_none());
    }

    #[tokio::test]
    async fn test_second_halt_suspends_and_resume_continues() {
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on_execute("first", ActivityOutcome::Halt)
                .on_resume("first", ActivityOutcome::done())
                .on_execute("second", ActivityOutcome::Halt)
                .on_resume("second", ActivityOutcome::done_with(RuntimeValue::from("ok"))),
        );
        let runner = WorkflowRunner::new(invoker.clone());
        let mut workflow = linear_workflow(&["first", "second", "last"]);
        let cancel = CancellationToken::new();

        let status = runner.run(&mut workflow, &cancel).await.unwrap();
        assert_eq!(status, WorkflowStatus::Halted);
        assert!(workflow.is_blocking(&ActivityId::from("second")));
        assert!(workflow.halted_at().is_some());

        let status = runner
            .resume(&mut workflow, &ActivityId::from("second"), &cancel)
            .await
            .unwrap();
        assert_eq!(status, WorkflowStatus::Finished);
        assert_eq!(workflow.current_scope().last_result(), Some(&RuntimeValue::from("ok")));
        assert_eq!(
            invoker.trace(),
            vec![
                "execute:first",
                "resume:first",
                "execute:second",
                "resume:second",
                "execute:last"
            ]
        );
    }

    #[tokio::test]
    async fn test_halt_reported_on_resume_commits_immediately() {
        let invoker = Arc::new(
            ScriptedInvoker::default()
                .on_execute("a", ActivityOutcome::Halt)
                .on_resume("a", ActivityOutcome::Halt)
                .on_resume("a", ActivityOutcome::Halt),
        );
        let runner = WorkflowRunner::new(invoker.clone());
        let mut workflow = linear_workflow(&["a"]);
        let cancel = CancellationToken::new();

        assert_eq!(runner.run(&mut workflow, &cancel).await.unwrap(), WorkflowStatus::Halted);
        let status = runner
            .resume(&mut workflow, &ActivityId::from("a"), &cancel)
            .await
            .unwrap();

        assert_eq!(status, WorkflowStatus::Halted);
        assert!(workflow.is_blocking(&ActivityId::from("a")));
        assert_eq!(invoker.trace(), vec!["execute:a", "resume:a", "resume:a"]);
    }

    #[tokio::test]
    async fn test_fault_outcome_faults_workflow() {
        let invoker = Arc::new(
            ScriptedInvoker::default().on_execute("b", ActivityOutcome::Fault("boom".into())),
        );
        let runner = WorkflowRunner::new(invoker);
        let mut workflow = linear_workflow(&["a", "b", "c"]);

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();

        assert_eq!(status, WorkflowStatus::Faulted);
        let fault = workflow.fault_info().unwrap();
        assert_eq!(fault.message, "boom");
        assert_eq!(fault.activity_id, Some(ActivityId::from("b")));
    }

    #[tokio::test]
    async fn test_cyclic_graph_faults() {
        let runner = WorkflowRunner::new(Arc::new(ScriptedInvoker::default()));
        let mut workflow = linear_workflow(&["a", "b"]);
        workflow.connect("b", "done", "a").unwrap();

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();
        assert_eq!(status, WorkflowStatus::Faulted);
    }

    #[tokio::test]
    async fn test_empty_workflow_finishes() {
        let runner = WorkflowRunner::new(Arc::new(ScriptedInvoker::default()));
        let mut workflow = Workflow::new(WorkflowMetadata::definition("empty"));

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();
        assert_eq!(status, WorkflowStatus::Finished);
    }

    #[tokio::test]
    async fn test_execution_bound_faults_loops() {
        let config = EngineConfig {
            max_activity_executions: 5,
            ..EngineConfig::default()
        };
        let runner = WorkflowRunner::with_config(Arc::new(ScriptedInvoker::default()), config);
        let mut workflow = linear_workflow(&["entry", "a", "b"]);
        workflow.connect("b", "done", "a").unwrap();

        let status = runner.run(&mut workflow, &CancellationToken::new()).await.unwrap();
        assert_eq!(status, WorkflowStatus::Faulted);
        assert!(workflow.fault_info().unwrap().message.contains("exceeded 5"));
    }

    #[tokio::test]
    async fn test_resume_over_budget_leaves_workflow_halted() {
        let config = EngineConfig {
            max_activity_executions: 0,
            ..EngineConfig::default()
        };
        let runner = WorkflowRunner::with_config(Arc::new(ScriptedInvoker::default()), config);
        let mut workflow = linear_workflow(&["a"]);
        let a = ActivityId::from("a");
        workflow.start().unwrap();
        workflow.halt(&a).unwrap();

        let result = runner.resume(&mut workflow, &a, &CancellationToken::new()).await;
        assert!(matches!(result, Err(CoreError::ActivityExecutionError(_))));
        assert!(workflow.is_halted());
        assert!(workflow.is_blocking(&a));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let runner = WorkflowRunner::new(Arc::new(ScriptedInvoker::default()));
        let mut workflow = linear_workflow(&["a"]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner.run(&mut workflow, &cancel).await;
        assert!(matches!(result, Err(CoreError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_resume_requires_blocking_activity() {
        let runner = WorkflowRunner::new(Arc::new(ScriptedInvoker::default()));
        let mut workflow = linear_workflow(&["a"]);

        let result = runner
            .resume(&mut workflow, &ActivityId::from("a"), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CoreError::InvalidStateTransition(_))));
    }
}
