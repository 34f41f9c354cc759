//! Persisted document shape
//!
//! | field | meaning |
//! |---|---|
//! | `metadata` | workflow identity |
//! | `status` | symbolic status name |
//! | `activities` | `id`, `name` and behaviour properties per activity |
//! | `connections` | `{source: {activityId, name}, target: {activityId}}` |
//! | `haltedActivities` | blocking activity IDs |
//! | `scopes` | `{id, variables: [{name, value}], lastResult}` |
//! | `currentScope` | ID of the active scope |
//! | `haltedAt`, `fault`, `faultedActivity` | optional diagnostics |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkflowDocument {
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub status: String,
    #[serde(default)]
    pub activities: Vec<Map<String, Value>>,
    #[serde(default)]
    pub connections: Vec<ConnectionToken>,
    #[serde(default)]
    pub halted_activities: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<ScopeToken>,
    #[serde(default)]
    pub current_scope: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faulted_activity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ConnectionToken {
    pub source: EndpointToken,
    pub target: TargetToken,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EndpointToken {
    pub activity_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetToken {
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopeToken {
    pub id: u64,
    #[serde(default)]
    pub variables: Vec<VariableToken>,
    #[serde(default)]
    pub last_result: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct VariableToken {
    pub name: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_document_defaults() {
        let document: WorkflowDocument =
            serde_json::from_value(json!({"status": "Idle"})).unwrap();
        assert!(document.activities.is_empty());
        assert!(document.scopes.is_empty());
        assert!(document.current_scope.is_none());
        assert!(document.halted_at.is_none());
    }

    #[test]
    fn test_camel_case_fields() {
        let document: WorkflowDocument = serde_json::from_value(json!({
            "status": "Halted",
            "connections": [{
                "source": {"activityId": "a", "name": "done"},
                "target": {"activityId": "b"}
            }],
            "haltedActivities": ["b"],
            "scopes": [{
                "id": 1,
                "variables": [{"name": "x", "value": {"type": "null"}}],
                "lastResult": null
            }],
            "currentScope": 1
        }))
        .unwrap();

        assert_eq!(document.connections[0].source.activity_id, "a");
        assert_eq!(document.connections[0].target.activity_id, "b");
        assert_eq!(document.halted_activities, vec!["b"]);
        assert_eq!(document.scopes[0].variables[0].name, "x");
        assert!(document.scopes[0].last_result.is_none());
        assert_eq!(document.current_scope, Some(1));

        let value = serde_json::to_value(&document).unwrap();
        assert!(value.get("haltedAt").is_none());
        assert!(value.get("currentScope").is_some());
    }

    #[test]
    fn test_missing_status_is_rejected() {
        let result = serde_json::from_value::<WorkflowDocument>(json!({"activities": []}));
        assert!(result.unwrap_err().to_string().contains("status"));
    }
}
