//! ID contexts threaded through one tokenize or detokenize call
//!
//! Activities are always addressed by their stable [`ActivityId`]; scopes get
//! document-local integer IDs assigned 1-based in stack order. Neither map
//! outlives the call that built it.

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::domain::activity::ActivityId;
use crate::domain::workflow::Workflow;
use crate::CoreError;

/// Document-local ID of the scope at a given stack position
#[inline]
pub fn scope_id(index: usize) -> u64 {
    index as u64 + 1
}

/// Lookups available while producing a document
#[derive(Debug, Default, Clone)]
pub struct TokenizationContext {
    activities: IndexSet<ActivityId>,
}

impl TokenizationContext {
    /// Index every activity of the workflow
    pub fn for_workflow(workflow: &Workflow) -> Self {
        Self {
            activities: workflow.activities().map(|a| a.id().clone()).collect(),
        }
    }

    /// Token for an activity reference; the activity must belong to the workflow
    pub fn activity_token(&self, id: &ActivityId) -> Result<String, CoreError> {
        if self.activities.contains(id) {
            Ok(id.0.clone())
        } else {
            Err(CoreError::integrity(
                "activityId",
                format!("reference to activity '{}' outside the workflow", id),
            ))
        }
    }

    /// Number of indexed activities
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }
}

/// Lookups available while reconstructing a workflow from a document
#[derive(Debug, Default, Clone)]
pub struct DetokenizationContext {
    activities: HashMap<String, ActivityId>,
    scopes: HashMap<u64, usize>,
}

impl DetokenizationContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an activity ID found in the document
    pub fn register_activity(&mut self, field: &str, id: &str) -> Result<ActivityId, CoreError> {
        if self.activities.contains_key(id) {
            return Err(CoreError::integrity(
                field,
                format!("duplicate activity id '{}'", id),
            ));
        }
        let activity_id = ActivityId::from(id);
        self.activities.insert(id.to_string(), activity_id.clone());
        Ok(activity_id)
    }

    /// Resolve an activity reference read from `field`
    pub fn resolve_activity(&self, field: &str, id: &str) -> Result<ActivityId, CoreError> {
        self.activities.get(id).cloned().ok_or_else(|| {
            CoreError::integrity(field, format!("unknown activity id '{}'", id))
        })
    }

    /// Register a scope's document-local ID at a stack position
    pub fn register_scope(&mut self, field: &str, id: u64, index: usize) -> Result<(), CoreError> {
        if self.scopes.insert(id, index).is_some() {
            return Err(CoreError::integrity(field, format!("duplicate scope id {}", id)));
        }
        Ok(())
    }

    /// Resolve a scope ID to its stack position
    pub fn resolve_scope(&self, field: &str, id: u64) -> Result<usize, CoreError> {
        self.scopes
            .get(&id)
            .copied()
            .ok_or_else(|| CoreError::integrity(field, format!("unknown scope id {}", id)))
    }

    /// Number of registered activities
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }
}
