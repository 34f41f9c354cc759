//! Repository traits for Haltflow Core
//!
//! Persisting tokenized workflow documents is the host's concern. This module
//! defines the boundary the core expects, plus an in-memory implementation
//! for tests and single-process hosts.

use async_trait::async_trait;
use serde_json::Value;

use super::workflow::WorkflowId;
use crate::CoreError;

/// Store for tokenized workflow documents, keyed by workflow instance ID
#[async_trait]
pub trait WorkflowDocumentStore: Send + Sync {
    /// Save (insert or replace) a document
    async fn save(&self, id: &WorkflowId, document: &Value) -> Result<(), CoreError>;

    /// Load a document by ID
    async fn load(&self, id: &WorkflowId) -> Result<Option<Value>, CoreError>;

    /// Delete a document
    async fn delete(&self, id: &WorkflowId) -> Result<(), CoreError>;

    /// IDs of all stored documents whose status is Halted
    async fn list_halted(&self) -> Result<Vec<WorkflowId>, CoreError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use crate::domain::workflow::WorkflowStatus;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory document store backed by a concurrent map
    #[derive(Clone, Default)]
    pub struct MemoryWorkflowDocumentStore {
        documents: Arc<DashMap<String, Value>>,
    }

    impl MemoryWorkflowDocumentStore {
        /// Create an empty store
        pub fn new() -> Self {
            Self {
                documents: Arc::new(DashMap::with_capacity(64)),
            }
        }

        /// Number of stored documents
        pub fn len(&self) -> usize {
            self.documents.len()
        }

        /// Check if the store is empty
        pub fn is_empty(&self) -> bool {
            self.documents.is_empty()
        }
    }

    #[async_trait]
    impl WorkflowDocumentStore for MemoryWorkflowDocumentStore {
        async fn save(&self, id: &WorkflowId, document: &Value) -> Result<(), CoreError> {
            if !document.is_object() {
                return Err(CoreError::StoreError(format!(
                    "Workflow document for {} must be a JSON object",
                    id
                )));
            }
            self.documents.insert(id.0.clone(), document.clone());
            Ok(())
        }

        async fn load(&self, id: &WorkflowId) -> Result<Option<Value>, CoreError> {
            Ok(self.documents.get(&id.0).map(|doc| doc.clone()))
        }

        async fn delete(&self, id: &WorkflowId) -> Result<(), CoreError> {
            self.documents.remove(&id.0);
            Ok(())
        }

        async fn list_halted(&self) -> Result<Vec<WorkflowId>, CoreError> {
            let halted = WorkflowStatus::Halted.as_str();
            let mut ids: Vec<WorkflowId> = self
                .documents
                .iter()
                .filter(|entry| {
                    entry
                        .value()
                        .get("status")
                        .and_then(Value::as_str)
                        .is_some_and(|status| status.eq_ignore_ascii_case(halted))
                })
                .map(|entry| WorkflowId(entry.key().clone()))
                .collect();
            ids.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(ids)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[tokio::test]
        async fn test_save_load_delete() {
            let store = MemoryWorkflowDocumentStore::new();
            let id = WorkflowId::from("wf-1");

            store.save(&id, &json!({"status": "Idle"})).await.unwrap();
            assert_eq!(store.len(), 1);

            let loaded = store.load(&id).await.unwrap().unwrap();
            assert_eq!(loaded["status"], "Idle");

            store.delete(&id).await.unwrap();
            assert!(store.load(&id).await.unwrap().is_none());
            assert!(store.is_empty());
        }

        #[tokio::test]
        async fn test_rejects_non_object_documents() {
            let store = MemoryWorkflowDocumentStore::new();
            let result = store.save(&WorkflowId::from("wf"), &json!([1, 2])).await;
            assert!(matches!(result, Err(CoreError::StoreError(_))));
        }

        #[tokio::test]
        async fn test_list_halted() {
            let store = MemoryWorkflowDocumentStore::new();
            store
                .save(&WorkflowId::from("b"), &json!({"status": "Halted"}))
                .await
                .unwrap();
            store
                .save(&WorkflowId::from("a"), &json!({"status": "Halted"}))
                .await
                .unwrap();
            store
                .save(&WorkflowId::from("c"), &json!({"status": "Finished"}))
                .await
                .unwrap();

            let halted = store.list_halted().await.unwrap();
            assert_eq!(halted, vec![WorkflowId::from("a"), WorkflowId::from("b")]);
        }
    }
}
