//! Activity entries
//!
//! An entry is a flat object: `id`, `name` (the behaviour-type tag) and the
//! behaviour's own properties. Entries whose type cannot be resolved become
//! [`UnknownActivity`] placeholders that write themselves back verbatim.

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::application::catalogue::ActivityCatalogue;
use crate::domain::activity::{
    is_reserved_key, Activity, ActivityKind, UnknownActivity, ACTIVITY_ID_KEY, ACTIVITY_NAME_KEY,
};
use crate::CoreError;

pub(crate) fn tokenize_activity(activity: &Activity) -> Map<String, Value> {
    match activity.kind() {
        ActivityKind::Unknown(unknown) => unknown.raw.clone(),
        ActivityKind::Behavior(behavior) => {
            let properties = behavior.properties();
            let mut entry = Map::with_capacity(properties.len() + 2);
            entry.insert(ACTIVITY_ID_KEY.into(), Value::String(activity.id().0.clone()));
            entry.insert(
                ACTIVITY_NAME_KEY.into(),
                Value::String(behavior.activity_type().to_string()),
            );
            entry.extend(properties.into_iter().filter(|(key, _)| !is_reserved_key(key)));
            entry
        }
    }
}

/// Identity fields of an entry, checked before any type is resolved
#[derive(Debug, Clone)]
pub(crate) struct ActivityEntry<'d> {
    pub index: usize,
    pub id: &'d str,
    pub name: &'d str,
    pub raw: &'d Map<String, Value>,
}

impl<'d> ActivityEntry<'d> {
    pub fn parse(index: usize, raw: &'d Map<String, Value>) -> Result<Self, CoreError> {
        Ok(Self {
            index,
            id: identity_field(raw, index, ACTIVITY_ID_KEY)?,
            name: identity_field(raw, index, ACTIVITY_NAME_KEY)?,
            raw,
        })
    }

    /// Properties without the identity keys
    fn properties(&self) -> Map<String, Value> {
        self.raw
            .iter()
            .filter(|(key, _)| !is_reserved_key(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

fn identity_field<'d>(
    raw: &'d Map<String, Value>,
    index: usize,
    key: &str,
) -> Result<&'d str, CoreError> {
    raw.get(key).and_then(Value::as_str).ok_or_else(|| {
        CoreError::integrity(format!("activities[{}].{}", index, key), "expected a string")
    })
}

/// Resolve an entry's type through the catalogue, falling back to a placeholder
pub(crate) async fn resolve_activity(
    catalogue: &Arc<dyn ActivityCatalogue>,
    entry: &ActivityEntry<'_>,
    cancel: &CancellationToken,
) -> Result<Activity, CoreError> {
    match catalogue.lookup_by_name(entry.name, cancel).await? {
        Some(descriptor) => {
            trace!(activity_id = entry.id, activity_type = entry.name, "Resolved activity type");
            let behavior = descriptor.instantiate(entry.properties()).map_err(|err| {
                CoreError::ActivityTypeError(format!(
                    "activities[{}] ({}): {}",
                    entry.index, entry.name, err
                ))
            })?;
            Ok(Activity::from_boxed(entry.id, behavior))
        }
        None => {
            warn!(
                activity_id = entry.id,
                activity_type = entry.name,
                "Unknown activity type, keeping placeholder"
            );
            Ok(Activity::unknown(
                entry.id,
                UnknownActivity {
                    name: entry.name.to_string(),
                    raw: entry.raw.clone(),
                },
            ))
        }
    }
}
