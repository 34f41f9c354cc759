use crate::{
    domain::activity::{Activity, ActivityId},
    domain::events::{
        DomainEvent, WorkflowAborted, WorkflowFaulted, WorkflowFinished, WorkflowHalted,
        WorkflowResumed, WorkflowStarted,
    },
    domain::graph::{ActivityGraph, Connection},
    domain::scope::{ExecutionScope, ScopeStack},
    types::RuntimeValue,
    CoreError,
};
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowStatus {
    /// Created but not started
    Idle,

    /// An execution attempt is in progress
    Running,

    /// Suspended on one or more blocking activities; resumable
    Halted,

    /// Failed because of an execution fault
    Faulted,

    /// Failed because the caller aborted it
    Aborted,

    /// Completed successfully
    Finished,
}

impl WorkflowStatus {
    /// All statuses, in declaration order
    pub const ALL: [WorkflowStatus; 6] = [
        WorkflowStatus::Idle,
        WorkflowStatus::Running,
        WorkflowStatus::Halted,
        WorkflowStatus::Faulted,
        WorkflowStatus::Aborted,
        WorkflowStatus::Finished,
    ];

    /// Symbolic name used in persisted documents
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Idle => "Idle",
            WorkflowStatus::Running => "Running",
            WorkflowStatus::Halted => "Halted",
            WorkflowStatus::Faulted => "Faulted",
            WorkflowStatus::Aborted => "Aborted",
            WorkflowStatus::Finished => "Finished",
        }
    }

    /// Check if no further execution can happen from this status
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Faulted | WorkflowStatus::Aborted | WorkflowStatus::Finished
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = CoreError;

    /// Parse a symbolic status name, ignoring ASCII case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CoreError::integrity("status", format!("unrecognized status '{}'", s)))
    }
}

/// Value object: Workflow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    /// Generate a fresh random workflow ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Definition identity of a workflow
///
/// A workflow with a parent reference is a running instance of that parent
/// definition; without one it is a definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Workflow ID
    pub id: WorkflowId,

    /// Definition this workflow was instantiated from
    pub parent_id: Option<WorkflowId>,

    /// Human-readable name
    pub name: Option<String>,

    /// Description
    pub description: Option<String>,

    /// Definition version
    pub version: u32,

    /// Correlation value used by hosts to route resume signals
    pub correlation_id: Option<String>,
}

impl WorkflowMetadata {
    /// Metadata for a workflow definition
    pub fn definition(id: impl Into<String>) -> Self {
        Self {
            id: WorkflowId(id.into()),
            parent_id: None,
            name: None,
            description: None,
            version: 1,
            correlation_id: None,
        }
    }

    /// Metadata for a new instance of the given definition
    pub fn instance_of(definition: &WorkflowMetadata) -> Self {
        Self {
            id: WorkflowId::generate(),
            parent_id: Some(definition.id.clone()),
            name: definition.name.clone(),
            description: definition.description.clone(),
            version: definition.version,
            correlation_id: None,
        }
    }

    /// Set the name, builder style
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Diagnostic record of an execution fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowFault {
    /// Error message
    pub message: String,
    /// The activity at the point of failure
    pub activity_id: Option<ActivityId>,
}

/// Aggregate: Workflow
///
/// A single writer is assumed for the duration of an execution attempt;
/// there is no internal locking.
#[derive(Debug)]
pub struct Workflow {
    /// Definition identity
    pub metadata: WorkflowMetadata,

    status: WorkflowStatus,

    graph: ActivityGraph,

    blocking_activities: IndexSet<ActivityId>,

    scopes: ScopeStack,

    halted_at: Option<DateTime<Utc>>,

    fault: Option<WorkflowFault>,

    events: Vec<Box<dyn DomainEvent>>,
}

// Domain events are not cloned
impl Clone for Workflow {
    fn clone(&self) -> Self {
        Self {
            metadata: self.metadata.clone(),
            status: self.status,
            graph: self.graph.clone(),
            blocking_activities: self.blocking_activities.clone(),
            scopes: self.scopes.clone(),
            halted_at: self.halted_at,
            fault: self.fault.clone(),
            events: Vec::new(),
        }
    }
}

impl Workflow {
    /// Create a fresh workflow: Idle, with a single root scope
    pub fn new(metadata: WorkflowMetadata) -> Self {
        Self {
            metadata,
            status: WorkflowStatus::Idle,
            graph: ActivityGraph::new(),
            blocking_activities: IndexSet::new(),
            scopes: ScopeStack::new(),
            halted_at: None,
            fault: None,
            events: Vec::with_capacity(4),
        }
    }

    /// Assemble a workflow from reconstructed parts, checking cross references
    pub(crate) fn from_parts(
        metadata: WorkflowMetadata,
        status: WorkflowStatus,
        graph: ActivityGraph,
        blocking_activities: IndexSet<ActivityId>,
        scopes: ScopeStack,
        halted_at: Option<DateTime<Utc>>,
        fault: Option<WorkflowFault>,
    ) -> Result<Self, CoreError> {
        graph.validate_connections()?;
        if let Some(missing) = blocking_activities.iter().find(|id| !graph.contains(id)) {
            return Err(CoreError::ActivityNotFound(missing.to_string()));
        }

        Ok(Self {
            metadata,
            status,
            graph,
            blocking_activities,
            scopes,
            halted_at,
            fault,
            events: Vec::new(),
        })
    }

    /// Workflow ID
    #[inline]
    pub fn id(&self) -> &WorkflowId {
        &self.metadata.id
    }

    /// Current status
    #[inline]
    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// A definition has no parent reference
    #[inline]
    pub fn is_definition(&self) -> bool {
        self.metadata.parent_id.is_none()
    }

    /// An instance has a parent definition
    #[inline]
    pub fn is_instance(&self) -> bool {
        self.metadata.parent_id.is_some()
    }

    /// Check if the workflow is suspended
    #[inline]
    pub fn is_halted(&self) -> bool {
        self.status == WorkflowStatus::Halted
    }

    /// Faulted and Aborted both count as failed
    #[inline]
    pub fn is_faulted(&self) -> bool {
        matches!(self.status, WorkflowStatus::Faulted | WorkflowStatus::Aborted)
    }

    /// Check if the workflow completed successfully
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.status == WorkflowStatus::Finished
    }

    /// When the workflow last committed to a suspension
    #[inline]
    pub fn halted_at(&self) -> Option<DateTime<Utc>> {
        self.halted_at
    }

    /// Fault diagnostics, if the workflow faulted
    #[inline]
    pub fn fault_info(&self) -> Option<&WorkflowFault> {
        self.fault.as_ref()
    }

    // ----- activity graph -----

    /// The activity graph
    #[inline]
    pub fn graph(&self) -> &ActivityGraph {
        &self.graph
    }

    /// Add an activity
    pub fn add_activity(&mut self, activity: Activity) -> Result<(), CoreError> {
        self.graph.add_activity(activity)
    }

    /// Connect an endpoint of one activity to another
    pub fn connect(
        &mut self,
        source: impl Into<ActivityId>,
        endpoint: impl Into<String>,
        target: impl Into<ActivityId>,
    ) -> Result<(), CoreError> {
        self.graph.connect(Connection::new(source, endpoint, target))
    }

    /// Remove an activity, its connections and any blocking entry for it
    ///
    /// Fails while a scope value still references the activity. A fault
    /// attributed to the activity keeps its message but loses the attribution.
    pub fn remove_activity(&mut self, id: &ActivityId) -> Result<Option<Activity>, CoreError> {
        if let Some(name) = self.scope_reference_to(id) {
            return Err(CoreError::ScopeError(format!(
                "Cannot remove activity {}: still referenced by scope value '{}'",
                id, name
            )));
        }

        self.blocking_activities.shift_remove(id);
        if let Some(fault) = self.fault.as_mut() {
            if fault.activity_id.as_ref() == Some(id) {
                fault.activity_id = None;
            }
        }
        Ok(self.graph.remove_activity(id))
    }

    fn scope_reference_to(&self, id: &ActivityId) -> Option<String> {
        self.scopes.scopes().iter().find_map(|scope| {
            scope
                .variables()
                .iter()
                .find(|(_, value)| value.activity_references().contains(&id))
                .map(|(name, _)| name.clone())
                .or_else(|| {
                    scope
                        .last_result()
                        .filter(|value| value.activity_references().contains(&id))
                        .map(|_| "lastResult".to_string())
                })
        })
    }

    /// Look up an activity
    #[inline]
    pub fn activity(&self, id: &ActivityId) -> Option<&Activity> {
        self.graph.activity(id)
    }

    /// Look up an activity for mutation of its properties
    #[inline]
    pub fn activity_mut(&mut self, id: &ActivityId) -> Option<&mut Activity> {
        self.graph.activity_mut(id)
    }

    /// Activities in declaration order
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.graph.activities()
    }

    /// Connections in declaration order
    #[inline]
    pub fn connections(&self) -> &[Connection] {
        self.graph.connections()
    }

    /// Activities that are not the target of any connection
    pub fn start_activities(&self) -> Vec<&Activity> {
        self.graph.start_activities()
    }

    /// Activities currently awaiting an external resume signal
    pub fn blocking_activities(&self) -> impl Iterator<Item = &ActivityId> {
        self.blocking_activities.iter()
    }

    /// Check if the given activity is blocking
    #[inline]
    pub fn is_blocking(&self, id: &ActivityId) -> bool {
        self.blocking_activities.contains(id)
    }

    // ----- scopes -----

    /// The scope stack
    #[inline]
    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    /// The scope currently in effect
    #[inline]
    pub fn current_scope(&self) -> &ExecutionScope {
        self.scopes.current()
    }

    /// The scope currently in effect, mutably
    #[inline]
    pub fn current_scope_mut(&mut self) -> &mut ExecutionScope {
        self.scopes.current_mut()
    }

    /// Enter a nested execution context
    pub fn push_scope(&mut self) -> &mut ExecutionScope {
        debug!(workflow_id = %self.metadata.id, depth = self.scopes.len() + 1, "Pushing scope");
        self.scopes.push()
    }

    /// Leave the innermost execution context; the root scope is never popped
    pub fn pop_scope(&mut self) -> Result<ExecutionScope, CoreError> {
        let scope = self.scopes.pop()?;
        debug!(workflow_id = %self.metadata.id, depth = self.scopes.len(), "Popped scope");
        Ok(scope)
    }

    /// Set a variable in the current scope
    pub fn set_variable(&mut self, name: impl Into<String>, value: RuntimeValue) {
        self.scopes.current_mut().set_variable(name, value);
    }

    /// Read a variable from the current scope
    pub fn variable(&self, name: &str) -> Option<&RuntimeValue> {
        self.scopes.current().variable(name)
    }

    /// Record the last produced result in the current scope
    pub fn set_last_result(&mut self, value: Option<RuntimeValue>) {
        self.scopes.current_mut().set_last_result(value);
    }

    // ----- lifecycle -----

    /// Begin a fresh execution attempt
    pub fn start(&mut self) -> Result<(), CoreError> {
        if self.status != WorkflowStatus::Idle {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot start workflow in state: {}",
                self.status
            )));
        }

        self.status = WorkflowStatus::Running;
        info!(workflow_id = %self.metadata.id, "Workflow started");

        self.record_event(Box::new(WorkflowStarted {
            workflow_id: self.metadata.id.clone(),
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// Commit to a suspension on the given activity
    pub fn halt(&mut self, activity_id: &ActivityId) -> Result<(), CoreError> {
        if !matches!(self.status, WorkflowStatus::Running | WorkflowStatus::Halted) {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot halt workflow in state: {}",
                self.status
            )));
        }
        if !self.graph.contains(activity_id) {
            return Err(CoreError::ActivityNotFound(activity_id.to_string()));
        }

        let now = Utc::now();
        self.blocking_activities.insert(activity_id.clone());
        self.status = WorkflowStatus::Halted;
        self.halted_at = Some(now);
        info!(workflow_id = %self.metadata.id, activity_id = %activity_id, "Workflow halted");

        self.record_event(Box::new(WorkflowHalted {
            workflow_id: self.metadata.id.clone(),
            activity_id: activity_id.clone(),
            timestamp: now,
        }));
        Ok(())
    }

    /// Return to Halted after an attempt ends while other activities still block
    pub fn suspend(&mut self) -> Result<(), CoreError> {
        if self.status != WorkflowStatus::Running || self.blocking_activities.is_empty() {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot suspend workflow in state {} with {} blocking activities",
                self.status,
                self.blocking_activities.len()
            )));
        }

        self.status = WorkflowStatus::Halted;
        self.halted_at = Some(Utc::now());
        debug!(
            workflow_id = %self.metadata.id,
            "Workflow suspended on remaining blocking activities"
        );
        Ok(())
    }

    /// Accept an external resume signal for a blocking activity
    pub fn resume(&mut self, activity_id: &ActivityId) -> Result<(), CoreError> {
        if self.status != WorkflowStatus::Halted {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot resume workflow in state: {}",
                self.status
            )));
        }
        if !self.blocking_activities.shift_remove(activity_id) {
            return Err(CoreError::ActivityNotFound(format!(
                "{} is not a blocking activity",
                activity_id
            )));
        }

        self.status = WorkflowStatus::Running;
        self.halted_at = None;
        info!(workflow_id = %self.metadata.id, activity_id = %activity_id, "Workflow resumed");

        self.record_event(Box::new(WorkflowResumed {
            workflow_id: self.metadata.id.clone(),
            activity_id: activity_id.clone(),
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// Complete the workflow successfully
    pub fn finish(&mut self) -> Result<(), CoreError> {
        if self.status != WorkflowStatus::Running {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot finish workflow in state: {}",
                self.status
            )));
        }

        self.status = WorkflowStatus::Finished;
        info!(workflow_id = %self.metadata.id, "Workflow finished");

        self.record_event(Box::new(WorkflowFinished {
            workflow_id: self.metadata.id.clone(),
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// Mark the workflow as faulted
    ///
    /// Blocking activities are left untouched so they reflect the point of failure.
    pub fn fault(
        &mut self,
        error: impl Into<String>,
        activity_id: Option<ActivityId>,
    ) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot fault workflow in state: {}",
                self.status
            )));
        }

        let error = error.into();
        warn!(workflow_id = %self.metadata.id, error = %error, "Workflow faulted");
        self.status = WorkflowStatus::Faulted;
        self.fault = Some(WorkflowFault {
            message: error.clone(),
            activity_id: activity_id.clone(),
        });

        self.record_event(Box::new(WorkflowFaulted {
            workflow_id: self.metadata.id.clone(),
            activity_id,
            error,
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// Abort the workflow
    pub fn abort(&mut self) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::InvalidStateTransition(format!(
                "Cannot abort workflow in state: {}",
                self.status
            )));
        }

        self.status = WorkflowStatus::Aborted;
        info!(workflow_id = %self.metadata.id, "Workflow aborted");

        self.record_event(Box::new(WorkflowAborted {
            workflow_id: self.metadata.id.clone(),
            timestamp: Utc::now(),
        }));
        Ok(())
    }

    /// Record a domain event
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Get and clear all domain events
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    /// Compare everything a caller can observe: metadata, status, graph
    /// topology, activity state, blocking set, scope contents and current scope
    pub fn is_equivalent(&self, other: &Workflow) -> bool {
        let same_activities = self.graph.activity_count() == other.graph.activity_count()
            && self.activities().all(|activity| {
                other
                    .activity(activity.id())
                    .is_some_and(|theirs| activity.is_equivalent(theirs))
            });

        self.metadata == other.metadata
            && self.status == other.status
            && same_activities
            && self.connections() == other.connections()
            && self.blocking_activities == other.blocking_activities
            && self.scopes == other.scopes
            && self.fault == other.fault
    }
}
