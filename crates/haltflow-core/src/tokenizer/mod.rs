//! Workflow tokenizer
//!
//! Converts a [`Workflow`] to a self-contained JSON document and back.
//! Activities are referenced by ID everywhere outside the `activities`
//! array; scopes get document-local IDs. Tokenizing is pure. Detokenizing
//! resolves behaviour types through the host's [`ActivityCatalogue`] and is
//! all-or-nothing: any error leaves no workflow behind.

pub mod context;
pub mod value;

mod activity;
mod document;
mod metadata;

use std::sync::Arc;

use futures::future::try_join_all;
use indexmap::IndexSet;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::application::catalogue::ActivityCatalogue;
use crate::config::EngineConfig;
use crate::domain::activity::Activity;
use crate::domain::graph::{ActivityGraph, Connection};
use crate::domain::scope::{ExecutionScope, ScopeStack};
use crate::domain::workflow::{Workflow, WorkflowFault, WorkflowStatus};
use crate::CoreError;

use self::activity::{resolve_activity, tokenize_activity, ActivityEntry};
use self::context::{scope_id, DetokenizationContext, TokenizationContext};
use self::document::{
    ConnectionToken, EndpointToken, ScopeToken, TargetToken, VariableToken, WorkflowDocument,
};
use self::metadata::{detokenize_metadata, tokenize_metadata};
use self::value::{nest, DefaultValueTokenizer, ValueTokenizer};

/// Converts workflows to and from persisted documents
#[derive(Clone)]
pub struct WorkflowTokenizer {
    catalogue: Arc<dyn ActivityCatalogue>,
    values: Arc<dyn ValueTokenizer>,
    config: EngineConfig,
}

impl WorkflowTokenizer {
    /// Create a tokenizer resolving activity types through `catalogue`
    pub fn new(catalogue: Arc<dyn ActivityCatalogue>) -> Self {
        Self {
            catalogue,
            values: Arc::new(DefaultValueTokenizer),
            config: EngineConfig::default(),
        }
    }

    /// Use a different value tokenizer for scope variables and results
    pub fn with_value_tokenizer(mut self, values: Arc<dyn ValueTokenizer>) -> Self {
        self.values = values;
        self
    }

    /// Use the given engine configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Produce the document for a workflow
    pub fn tokenize(&self, workflow: &Workflow) -> Result<Value, CoreError> {
        let ctx = TokenizationContext::for_workflow(workflow);

        let activities = workflow.activities().map(tokenize_activity).collect();
        let connections = workflow
            .connections()
            .iter()
            .map(|connection| ConnectionToken {
                source: EndpointToken {
                    activity_id: connection.source.0.clone(),
                    name: connection.endpoint.clone(),
                },
                target: TargetToken {
                    activity_id: connection.target.0.clone(),
                },
            })
            .collect();
        let halted_activities = workflow
            .blocking_activities()
            .map(|id| id.0.clone())
            .collect();
        let scopes = workflow
            .scopes()
            .scopes()
            .iter()
            .enumerate()
            .map(|(index, scope)| self.tokenize_scope(&ctx, index, scope))
            .collect::<Result<Vec<_>, _>>()?;

        let fault = workflow.fault_info();
        let faulted_activity = fault
            .and_then(|f| f.activity_id.as_ref())
            .map(|id| {
                ctx.activity_token(id).map_err(|_| {
                    CoreError::integrity(
                        "faultedActivity",
                        format!("fault attributed to activity '{}' outside the workflow", id),
                    )
                })
            })
            .transpose()?;
        let document = WorkflowDocument {
            metadata: tokenize_metadata(&workflow.metadata),
            status: workflow.status().as_str().to_string(),
            activities,
            connections,
            halted_activities,
            scopes,
            current_scope: Some(scope_id(workflow.scopes().current_index())),
            halted_at: workflow.halted_at(),
            fault: fault.map(|f| f.message.clone()),
            faulted_activity,
        };

        debug!(
            workflow_id = %workflow.id(),
            activities = ctx.activity_count(),
            "Tokenized workflow"
        );
        Ok(serde_json::to_value(&document)?)
    }

    /// Produce the document for a workflow as a JSON string
    pub fn tokenize_to_string(&self, workflow: &Workflow) -> Result<String, CoreError> {
        Ok(serde_json::to_string(&self.tokenize(workflow)?)?)
    }

    /// Reconstruct a workflow from its document
    #[instrument(skip_all)]
    pub async fn detokenize(
        &self,
        document: &Value,
        cancel: &CancellationToken,
    ) -> Result<Workflow, CoreError> {
        let document = WorkflowDocument::deserialize(document)
            .map_err(|err| CoreError::integrity("document", err.to_string()))?;

        let metadata = detokenize_metadata(&document.metadata)?;
        let status: WorkflowStatus = document.status.parse()?;

        let entries = document
            .activities
            .iter()
            .enumerate()
            .map(|(index, raw)| ActivityEntry::parse(index, raw))
            .collect::<Result<Vec<_>, _>>()?;
        let activities = self.resolve_activities(&entries, cancel).await?;

        let mut ctx = DetokenizationContext::new();
        let mut graph = ActivityGraph::new();
        for (entry, activity) in entries.iter().zip(activities) {
            ctx.register_activity(&format!("activities[{}].id", entry.index), entry.id)?;
            graph.add_activity(activity)?;
        }

        for (index, token) in document.connections.iter().enumerate() {
            let source = ctx.resolve_activity(
                &format!("connections[{}].source.activityId", index),
                &token.source.activity_id,
            )?;
            let target = ctx.resolve_activity(
                &format!("connections[{}].target.activityId", index),
                &token.target.activity_id,
            )?;
            graph.connect(Connection::new(source, token.source.name.clone(), target))?;
        }

        let mut blocking_activities = IndexSet::with_capacity(document.halted_activities.len());
        for (index, id) in document.halted_activities.iter().enumerate() {
            blocking_activities
                .insert(ctx.resolve_activity(&format!("haltedActivities[{}]", index), id)?);
        }

        let scopes = self.detokenize_scopes(&mut ctx, &document)?;

        let fault = match (&document.fault, &document.faulted_activity) {
            (Some(message), activity) => Some(WorkflowFault {
                message: message.clone(),
                activity_id: activity
                    .as_deref()
                    .map(|id| ctx.resolve_activity("faultedActivity", id))
                    .transpose()?,
            }),
            (None, Some(_)) => {
                return Err(CoreError::integrity(
                    "faultedActivity",
                    "faulted activity recorded without a fault",
                ))
            }
            (None, None) => None,
        };

        let workflow = Workflow::from_parts(
            metadata,
            status,
            graph,
            blocking_activities,
            scopes,
            document.halted_at,
            fault,
        )?;
        debug!(
            workflow_id = %workflow.id(),
            activities = ctx.activity_count(),
            "Detokenized workflow"
        );
        Ok(workflow)
    }

    /// Reconstruct a workflow from a JSON string
    pub async fn detokenize_str(
        &self,
        document: &str,
        cancel: &CancellationToken,
    ) -> Result<Workflow, CoreError> {
        let document: Value = serde_json::from_str(document)
            .map_err(|err| CoreError::integrity("document", err.to_string()))?;
        self.detokenize(&document, cancel).await
    }

    fn tokenize_scope(
        &self,
        ctx: &TokenizationContext,
        index: usize,
        scope: &ExecutionScope,
    ) -> Result<ScopeToken, CoreError> {
        let variables = scope
            .variables()
            .iter()
            .enumerate()
            .map(|(position, (name, value))| -> Result<VariableToken, CoreError> {
                let value = self.values.tokenize(ctx, value).map_err(|err| {
                    nest(err, &format!("scopes[{}].variables[{}].value", index, position))
                })?;
                Ok(VariableToken {
                    name: name.clone(),
                    value,
                })
            })
            .collect::<Result<Vec<_>, CoreError>>()?;

        let last_result = scope
            .last_result()
            .map(|value| {
                self.values
                    .tokenize(ctx, value)
                    .map_err(|err| nest(err, &format!("scopes[{}].lastResult", index)))
            })
            .transpose()?;

        Ok(ScopeToken {
            id: scope_id(index),
            variables,
            last_result,
        })
    }

    fn detokenize_scopes(
        &self,
        ctx: &mut DetokenizationContext,
        document: &WorkflowDocument,
    ) -> Result<ScopeStack, CoreError> {
        if document.scopes.is_empty() {
            debug!("Document has no scopes, synthesizing a root scope");
            return Ok(ScopeStack::new());
        }

        let mut scopes = Vec::with_capacity(document.scopes.len());
        for (index, token) in document.scopes.iter().enumerate() {
            ctx.register_scope(&format!("scopes[{}].id", index), token.id, index)?;

            let mut scope = ExecutionScope::new();
            for (position, variable) in token.variables.iter().enumerate() {
                let value = self.values.detokenize(ctx, &variable.value).map_err(|err| {
                    nest(err, &format!("scopes[{}].variables[{}].value", index, position))
                })?;
                scope.set_variable(variable.name.clone(), value);
            }
            if let Some(token) = &token.last_result {
                let value = self
                    .values
                    .detokenize(ctx, token)
                    .map_err(|err| nest(err, &format!("scopes[{}].lastResult", index)))?;
                scope.set_last_result(Some(value));
            }
            scopes.push(scope);
        }

        let current = document
            .current_scope
            .ok_or_else(|| CoreError::integrity("currentScope", "missing current scope id"))?;
        let current = ctx.resolve_scope("currentScope", current)?;
        ScopeStack::from_scopes(scopes, current)
    }

    async fn resolve_activities(
        &self,
        entries: &[ActivityEntry<'_>],
        cancel: &CancellationToken,
    ) -> Result<Vec<Activity>, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled("activity type resolution".to_string()));
        }

        if self.config.concurrent_type_resolution {
            return try_join_all(
                entries
                    .iter()
                    .map(|entry| resolve_activity(&self.catalogue, entry, cancel)),
            )
            .await;
        }

        let mut activities = Vec::with_capacity(entries.len());
        for entry in entries {
            activities.push(resolve_activity(&self.catalogue, entry, cancel).await?);
        }
        Ok(activities)
    }
}
