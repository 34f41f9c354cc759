//!
//! Haltflow Core - execution-state core of the Haltflow workflow engine
//!
//! This crate holds what a workflow engine needs to suspend a workflow and
//! pick it up again later, possibly in another process:
//!
//! - the activity graph of a workflow and its execution scopes,
//! - the halt/resume state machine with first-pass self-resume,
//! - a tokenizer that turns a workflow into a persistable document and back.
//!
//! Activity behaviour, persistence and scheduling belong to the host; the
//! crate consumes them through [`ActivityInvoker`], [`ActivityCatalogue`] and
//! [`WorkflowDocumentStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - workflow aggregate, activities, scopes and events
pub mod domain;

/// Application services - catalogue, invoker contract, halt control and runner
pub mod application;

/// Workflow document tokenizer
pub mod tokenizer;

/// Runtime values stored in scopes
pub mod types;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

pub use error::CoreError;
pub use types::RuntimeValue;
pub use config::EngineConfig;

pub use domain::activity::{
    Activity, ActivityBehavior, ActivityId, ActivityKind, PropertyBagActivity, UnknownActivity,
};
pub use domain::events::DomainEvent;
pub use domain::graph::{ActivityGraph, Connection};
pub use domain::repository::WorkflowDocumentStore;
pub use domain::scope::{ExecutionScope, ScopeStack};
pub use domain::workflow::{Workflow, WorkflowFault, WorkflowId, WorkflowMetadata, WorkflowStatus};

pub use application::catalogue::{
    ActivityCatalogue, ActivityDescriptor, ActivityRegistry, PropertyBagDescriptor,
};
pub use application::halt::{ExecutionContext, HaltController, HaltResolution};
pub use application::invoker::{ActivityInvoker, ActivityOutcome, DONE_ENDPOINT};
pub use application::runner::WorkflowRunner;

pub use tokenizer::context::{DetokenizationContext, TokenizationContext};
pub use tokenizer::value::{DefaultValueTokenizer, ValueTokenizer};
pub use tokenizer::WorkflowTokenizer;

/// Cooperative cancellation signal accepted by async operations
pub use tokio_util::sync::CancellationToken;
