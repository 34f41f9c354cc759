//! Generic value tokenizer
//!
//! Scope variables and last results are written as tagged tokens:
//!
//! ```json
//! {"type": "json", "value": {"total": 12}}
//! {"type": "activity", "activityId": "approve"}
//! {"type": "list", "items": [ ... ]}
//! ```
//!
//! Integrity errors carry a field path relative to the token root.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::{json, Map, Value};

use super::context::{DetokenizationContext, TokenizationContext};
use crate::types::RuntimeValue;
use crate::CoreError;

const TYPE_KEY: &str = "type";

/// Converts runtime values to and from document tokens
pub trait ValueTokenizer: Send + Sync {
    /// Produce the token for a value
    fn tokenize(&self, ctx: &TokenizationContext, value: &RuntimeValue)
        -> Result<Value, CoreError>;

    /// Rebuild a value from its token
    fn detokenize(
        &self,
        ctx: &DetokenizationContext,
        token: &Value,
    ) -> Result<RuntimeValue, CoreError>;
}

/// Tagged-token value tokenizer
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultValueTokenizer;

impl ValueTokenizer for DefaultValueTokenizer {
    fn tokenize(
        &self,
        ctx: &TokenizationContext,
        value: &RuntimeValue,
    ) -> Result<Value, CoreError> {
        let token = match value {
            RuntimeValue::Null => json!({ "type": "null" }),
            RuntimeValue::Json(inner) => json!({ "type": "json", "value": inner }),
            RuntimeValue::Activity(id) => {
                json!({ "type": "activity", "activityId": ctx.activity_token(id)? })
            }
            RuntimeValue::List(items) => {
                let items = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.tokenize(ctx, item)
                            .map_err(|e| nest(e, &format!("items[{}]", i)))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                json!({ "type": "list", "items": items })
            }
            RuntimeValue::Map(entries) => {
                let mut tokens = Map::with_capacity(entries.len());
                for (key, entry) in entries {
                    let token = self
                        .tokenize(ctx, entry)
                        .map_err(|e| nest(e, &format!("entries.{}", key)))?;
                    tokens.insert(key.clone(), token);
                }
                json!({ "type": "map", "entries": tokens })
            }
            RuntimeValue::Timestamp(at) => json!({
                "type": "timestamp",
                "value": at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            }),
        };
        Ok(token)
    }

    fn detokenize(
        &self,
        ctx: &DetokenizationContext,
        token: &Value,
    ) -> Result<RuntimeValue, CoreError> {
        let object = token
            .as_object()
            .ok_or_else(|| CoreError::integrity(TYPE_KEY, "value token must be an object"))?;
        let tag = object
            .get(TYPE_KEY)
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::integrity(TYPE_KEY, "missing value type tag"))?;

        match tag {
            "null" => Ok(RuntimeValue::Null),
            "json" => Ok(RuntimeValue::Json(
                object.get("value").cloned().unwrap_or(Value::Null),
            )),
            "activity" => {
                let id = required_str(object, "activityId")?;
                Ok(RuntimeValue::Activity(ctx.resolve_activity("activityId", id)?))
            }
            "list" => {
                let items = object
                    .get("items")
                    .and_then(Value::as_array)
                    .ok_or_else(|| CoreError::integrity("items", "expected an array"))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| {
                        self.detokenize(ctx, item)
                            .map_err(|e| nest(e, &format!("items[{}]", i)))
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(RuntimeValue::List)
            }
            "map" => {
                let entries = object
                    .get("entries")
                    .and_then(Value::as_object)
                    .ok_or_else(|| CoreError::integrity("entries", "expected an object"))?;
                let mut values = IndexMap::with_capacity(entries.len());
                for (key, entry) in entries {
                    let value = self
                        .detokenize(ctx, entry)
                        .map_err(|e| nest(e, &format!("entries.{}", key)))?;
                    values.insert(key.clone(), value);
                }
                Ok(RuntimeValue::Map(values))
            }
            "timestamp" => {
                let raw = required_str(object, "value")?;
                DateTime::parse_from_rfc3339(raw)
                    .map(|at| RuntimeValue::Timestamp(at.with_timezone(&Utc)))
                    .map_err(|e| CoreError::integrity("value", format!("invalid timestamp: {}", e)))
            }
            other => Err(CoreError::integrity(
                TYPE_KEY,
                format!("unrecognized value type '{}'", other),
            )),
        }
    }
}

fn required_str<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a str, CoreError> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| CoreError::integrity(key, "expected a string"))
}

/// Prefix the field path of an integrity error
pub(crate) fn nest(err: CoreError, prefix: &str) -> CoreError {
    match err {
        CoreError::DocumentIntegrity { field, reason } => CoreError::DocumentIntegrity {
            field: format!("{}.{}", prefix, field),
            reason,
        },
        other => other,
    }
}
