use crate::domain::activity::ActivityId;
use crate::domain::workflow::WorkflowId;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Domain event trait for all workflow lifecycle events
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the workflow this event is associated with
    fn workflow_id(&self) -> &WorkflowId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;
}

macro_rules! impl_domain_event {
    ($event:ty, $name:literal) => {
        impl DomainEvent for $event {
            fn event_type(&self) -> &'static str {
                $name
            }

            fn workflow_id(&self) -> &WorkflowId {
                &self.workflow_id
            }

            fn timestamp(&self) -> DateTime<Utc> {
                self.timestamp
            }
        }
    };
}

/// Event: Workflow started running
#[derive(Debug)]
pub struct WorkflowStarted {
    /// The workflow that started
    pub workflow_id: WorkflowId,
    /// When the workflow started
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowStarted, "workflow.started");

/// Event: Workflow suspended on a blocking activity
#[derive(Debug)]
pub struct WorkflowHalted {
    /// The workflow that halted
    pub workflow_id: WorkflowId,
    /// The activity now awaiting a resume signal
    pub activity_id: ActivityId,
    /// When the workflow halted
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowHalted, "workflow.halted");

/// Event: Workflow resumed from a blocking activity
#[derive(Debug)]
pub struct WorkflowResumed {
    /// The workflow that resumed
    pub workflow_id: WorkflowId,
    /// The activity that received the resume signal
    pub activity_id: ActivityId,
    /// When the workflow resumed
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowResumed, "workflow.resumed");

/// Event: Workflow finished successfully
#[derive(Debug)]
pub struct WorkflowFinished {
    /// The workflow that finished
    pub workflow_id: WorkflowId,
    /// When the workflow finished
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowFinished, "workflow.finished");

/// Event: Workflow faulted
#[derive(Debug)]
pub struct WorkflowFaulted {
    /// The workflow that faulted
    pub workflow_id: WorkflowId,
    /// The activity at the point of failure, if known
    pub activity_id: Option<ActivityId>,
    /// The error message
    pub error: String,
    /// When the workflow faulted
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowFaulted, "workflow.faulted");

/// Event: Workflow aborted by the caller
#[derive(Debug)]
pub struct WorkflowAborted {
    /// The workflow that was aborted
    pub workflow_id: WorkflowId,
    /// When the workflow was aborted
    pub timestamp: DateTime<Utc>,
}

impl_domain_event!(WorkflowAborted, "workflow.aborted");
