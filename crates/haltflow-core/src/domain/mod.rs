/// Activity identity and polymorphic behaviour representation
pub mod activity;

/// Activity graph: connections and root detection
pub mod graph;

/// Execution scopes and the scope stack
pub mod scope;

/// Workflow aggregate
pub mod workflow;

/// Domain events
pub mod events;

/// Repository interfaces
pub mod repository;
