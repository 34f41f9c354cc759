//! Workflow metadata tokens
//!
//! Written with camelCase keys; read back with case-normalized matching so
//! `parentId`, `ParentId` and `parent_id` are all accepted.

use serde_json::{Map, Value};

use crate::domain::workflow::{WorkflowId, WorkflowMetadata};
use crate::CoreError;

fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

pub(crate) fn tokenize_metadata(metadata: &WorkflowMetadata) -> Map<String, Value> {
    let mut token = Map::new();
    token.insert("id".into(), Value::String(metadata.id.0.clone()));
    token.insert(
        "parentId".into(),
        metadata
            .parent_id
            .as_ref()
            .map_or(Value::Null, |id| Value::String(id.0.clone())),
    );
    token.insert("name".into(), optional_string(&metadata.name));
    token.insert("description".into(), optional_string(&metadata.description));
    token.insert("version".into(), Value::from(metadata.version));
    token.insert("correlationId".into(), optional_string(&metadata.correlation_id));
    token
}

pub(crate) fn detokenize_metadata(
    token: &Map<String, Value>,
) -> Result<WorkflowMetadata, CoreError> {
    let mut id = None;
    let mut metadata = WorkflowMetadata::definition(String::new());

    for (key, value) in token {
        let field = format!("metadata.{}", key);
        match normalize_key(key).as_str() {
            "id" => id = read_string(&field, value)?,
            "parentid" => metadata.parent_id = read_string(&field, value)?.map(WorkflowId),
            "name" => metadata.name = read_string(&field, value)?,
            "description" => metadata.description = read_string(&field, value)?,
            "correlationid" => metadata.correlation_id = read_string(&field, value)?,
            "version" => {
                if !value.is_null() {
                    metadata.version = value
                        .as_u64()
                        .and_then(|v| u32::try_from(v).ok())
                        .ok_or_else(|| {
                            CoreError::integrity(&field, "expected an unsigned integer")
                        })?;
                }
            }
            _ => {}
        }
    }

    let id = id.ok_or_else(|| CoreError::integrity("metadata.id", "missing workflow id"))?;
    metadata.id = WorkflowId(id);
    Ok(metadata)
}

fn optional_string(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::String)
}

fn read_string(field: &str, value: &Value) -> Result<Option<String>, CoreError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(CoreError::integrity(field, "expected a string")),
    }
}
