use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::domain::activity::ActivityId;

/// A value held in an execution scope
///
/// Scope variables and last results can carry plain JSON data as well as
/// references to activities of the same workflow. References are stored by
/// [`ActivityId`] only; the activity itself always lives in the workflow's
/// activity set.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum RuntimeValue {
    /// Absence of a value
    #[default]
    Null,
    /// Plain JSON data
    Json(serde_json::Value),
    /// Reference to an activity of the owning workflow
    Activity(ActivityId),
    /// Ordered list of values
    List(Vec<RuntimeValue>),
    /// String-keyed map of values, insertion ordered
    Map(IndexMap<String, RuntimeValue>),
    /// Wall-clock instant
    Timestamp(DateTime<Utc>),
}

impl RuntimeValue {
    /// Create a runtime value from a JSON value
    #[inline]
    pub fn json(value: serde_json::Value) -> Self {
        Self::Json(value)
    }

    /// Create a runtime value from a serializable value
    pub fn from_serializable<T>(value: &T) -> Result<Self, serde_json::Error>
    where
        T: Serialize,
    {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    /// Create a runtime value referencing an activity
    #[inline]
    pub fn activity(id: impl Into<ActivityId>) -> Self {
        Self::Activity(id.into())
    }

    /// Check if the value is null
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null) || matches!(self, Self::Json(serde_json::Value::Null))
    }

    /// Get the inner JSON value, if this is plain data
    #[inline]
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Try to read the value as a string
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(|v| v.as_str())
    }

    /// Try to read the value as a number
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(|v| v.as_f64())
    }

    /// Get the referenced activity ID, if this is an activity reference
    #[inline]
    pub fn as_activity(&self) -> Option<&ActivityId> {
        match self {
            Self::Activity(id) => Some(id),
            _ => None,
        }
    }

    /// Visit every activity reference contained in this value, depth first
    pub fn activity_references(&self) -> Vec<&ActivityId> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a ActivityId>) {
        match self {
            Self::Activity(id) => refs.push(id),
            Self::List(items) => items.iter().for_each(|item| item.collect_references(refs)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_references(refs)),
            Self::Null | Self::Json(_) | Self::Timestamp(_) => {}
        }
    }
}

impl From<serde_json::Value> for RuntimeValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for RuntimeValue {
    fn from(value: &str) -> Self {
        Self::Json(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for RuntimeValue {
    fn from(value: String) -> Self {
        Self::Json(serde_json::Value::String(value))
    }
}

impl From<bool> for RuntimeValue {
    fn from(value: bool) -> Self {
        Self::Json(serde_json::Value::Bool(value))
    }
}

impl From<i64> for RuntimeValue {
    fn from(value: i64) -> Self {
        Self::Json(serde_json::Value::from(value))
    }
}

impl From<DateTime<Utc>> for RuntimeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<Vec<RuntimeValue>> for RuntimeValue {
    fn from(items: Vec<RuntimeValue>) -> Self {
        Self::List(items)
    }
}
