//! Activity graph model
//!
//! Activities are stored in declaration order and are unique by ID.
//! Connections refer to activities by ID only.

use crate::domain::activity::{Activity, ActivityId};
use crate::CoreError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Directed edge from a named output endpoint of one activity to another activity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source activity
    pub source: ActivityId,
    /// Output endpoint of the source activity (e.g. "done", "true", "false")
    pub endpoint: String,
    /// Target activity
    pub target: ActivityId,
}

impl Connection {
    /// Create a new connection
    pub fn new(
        source: impl Into<ActivityId>,
        endpoint: impl Into<String>,
        target: impl Into<ActivityId>,
    ) -> Self {
        Self {
            source: source.into(),
            endpoint: endpoint.into(),
            target: target.into(),
        }
    }
}

/// The activities of a workflow and the connections between them
#[derive(Debug, Clone, Default)]
pub struct ActivityGraph {
    activities: IndexMap<ActivityId, Activity>,
    connections: Vec<Connection>,
}

impl ActivityGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an activity; its ID must not already be present
    pub fn add_activity(&mut self, activity: Activity) -> Result<(), CoreError> {
        if self.activities.contains_key(activity.id()) {
            return Err(CoreError::DuplicateActivity(activity.id().to_string()));
        }
        self.activities.insert(activity.id().clone(), activity);
        Ok(())
    }

    /// Remove an activity together with every connection touching it
    pub fn remove_activity(&mut self, id: &ActivityId) -> Option<Activity> {
        let removed = self.activities.shift_remove(id)?;
        self.connections
            .retain(|connection| &connection.source != id && &connection.target != id);
        Some(removed)
    }

    /// Connect an endpoint of `source` to `target`; both must be present
    pub fn connect(&mut self, connection: Connection) -> Result<(), CoreError> {
        if !self.contains(&connection.source) || !self.contains(&connection.target) {
            return Err(dangling(&connection));
        }
        if !self.connections.contains(&connection) {
            self.connections.push(connection);
        }
        Ok(())
    }

    /// Check if an activity with the given ID is present
    #[inline]
    pub fn contains(&self, id: &ActivityId) -> bool {
        self.activities.contains_key(id)
    }

    /// Look up an activity by ID
    #[inline]
    pub fn activity(&self, id: &ActivityId) -> Option<&Activity> {
        self.activities.get(id)
    }

    /// Look up an activity by ID for mutation
    #[inline]
    pub fn activity_mut(&mut self, id: &ActivityId) -> Option<&mut Activity> {
        self.activities.get_mut(id)
    }

    /// Activities in declaration order
    pub fn activities(&self) -> impl Iterator<Item = &Activity> {
        self.activities.values()
    }

    /// Number of activities
    #[inline]
    pub fn activity_count(&self) -> usize {
        self.activities.len()
    }

    /// Connections in declaration order
    #[inline]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Activities that are not the target of any connection
    ///
    /// A graph may have several roots. An empty result for a non-empty graph
    /// means every activity sits on a cycle; that is reported by the invoker,
    /// not here.
    pub fn start_activities(&self) -> Vec<&Activity> {
        let targets: HashSet<&ActivityId> = self.connections.iter().map(|c| &c.target).collect();
        self.activities
            .values()
            .filter(|activity| !targets.contains(activity.id()))
            .collect()
    }

    /// Targets connected to the given endpoint of `source`, in declaration order
    pub fn outbound(&self, source: &ActivityId, endpoint: &str) -> Vec<&ActivityId> {
        self.connections
            .iter()
            .filter(|c| &c.source == source && c.endpoint == endpoint)
            .map(|c| &c.target)
            .collect()
    }

    /// Connections leading into `target`
    pub fn inbound(&self, target: &ActivityId) -> Vec<&Connection> {
        self.connections.iter().filter(|c| &c.target == target).collect()
    }

    /// Ensure every connection references activities of this graph
    pub fn validate_connections(&self) -> Result<(), CoreError> {
        match self
            .connections
            .iter()
            .find(|c| !self.contains(&c.source) || !self.contains(&c.target))
        {
            Some(connection) => Err(dangling(connection)),
            None => Ok(()),
        }
    }
}

fn dangling(connection: &Connection) -> CoreError {
    CoreError::DanglingConnection {
        source_id: connection.source.to_string(),
        endpoint: connection.endpoint.clone(),
        target_id: connection.target.to_string(),
    }
}
