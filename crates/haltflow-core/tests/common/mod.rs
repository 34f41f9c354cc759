#![allow(dead_code)]

use async_trait::async_trait;
use haltflow_core::{
    Activity, ActivityId, ActivityInvoker, ActivityOutcome, ActivityRegistry, CancellationToken,
    CoreError, ExecutionContext, PropertyBagActivity, RuntimeValue, Workflow, WorkflowMetadata,
};
use serde_json::json;
use std::sync::Mutex;

/// Install a test subscriber once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("haltflow_core=debug")
        .with_test_writer()
        .try_init();
}

/// Catalogue knowing every behaviour type used by the fixtures
pub fn registry() -> ActivityRegistry {
    ActivityRegistry::new()
        .with_property_bag("WriteLine")
        .with_property_bag("Signal")
        .with_property_bag("Fail")
}

/// greet (WriteLine) -> wait (Signal) -> after (WriteLine)
pub fn signal_workflow() -> Workflow {
    let definition = WorkflowMetadata::definition("signal-def").with_name("Signal approval");
    let mut workflow = Workflow::new(WorkflowMetadata::instance_of(&definition));

    workflow
        .add_activity(Activity::new(
            "greet",
            PropertyBagActivity::new("WriteLine").with("text", json!("request received")),
        ))
        .unwrap();
    workflow
        .add_activity(Activity::new(
            "wait",
            PropertyBagActivity::new("Signal").with("signal", json!("approval")),
        ))
        .unwrap();
    workflow
        .add_activity(Activity::new(
            "after",
            PropertyBagActivity::new("WriteLine").with("text", json!("approved")),
        ))
        .unwrap();
    workflow.connect("greet", "done", "wait").unwrap();
    workflow.connect("wait", "done", "after").unwrap();
    workflow
}

/// Invoker implementing the fixture behaviour types
///
/// - `WriteLine` records its `text` and continues with it as output
/// - `Signal` halts until the current scope holds a `signal` variable
/// - `Fail` raises an execution error
#[derive(Default)]
pub struct FixtureInvoker {
    log: Mutex<Vec<String>>,
}

impl FixtureInvoker {
    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

fn activity_type(ctx: &ExecutionContext<'_>, id: &ActivityId) -> Result<String, CoreError> {
    ctx.workflow()
        .activity(id)
        .map(|activity| activity.name().to_string())
        .ok_or_else(|| CoreError::ActivityNotFound(id.to_string()))
}

#[async_trait]
impl ActivityInvoker for FixtureInvoker {
    async fn execute_activity(
        &self,
        ctx: &mut ExecutionContext<'_>,
        activity_id: &ActivityId,
        _cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, CoreError> {
        self.record(format!("execute:{}", activity_id));
        match activity_type(ctx, activity_id)?.as_str() {
            "WriteLine" => {
                let text = ctx
                    .workflow()
                    .activity(activity_id)
                    .and_then(|activity| activity.properties().get("text").cloned())
                    .unwrap_or(serde_json::Value::Null);
                Ok(ActivityOutcome::done_with(RuntimeValue::Json(text)))
            }
            "Signal" => {
                ctx.workflow_mut()
                    .set_variable("waitingOn", RuntimeValue::Activity(activity_id.clone()));
                Ok(ActivityOutcome::Halt)
            }
            "Fail" => Err(CoreError::ActivityExecutionError(format!(
                "{} failed on purpose",
                activity_id
            ))),
            other => Err(CoreError::ActivityTypeError(other.to_string())),
        }
    }

    async fn resume_activity(
        &self,
        ctx: &mut ExecutionContext<'_>,
        activity_id: &ActivityId,
        _cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, CoreError> {
        self.record(format!("resume:{}", activity_id));
        match ctx.workflow().variable("signal").cloned() {
            Some(signal) => Ok(ActivityOutcome::done_with(signal)),
            None => Ok(ActivityOutcome::Halt),
        }
    }
}
