use crate::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Document key holding an activity's stable ID
pub const ACTIVITY_ID_KEY: &str = "id";

/// Document key holding an activity's behaviour-type name
pub const ACTIVITY_NAME_KEY: &str = "name";

/// Value object: Activity ID
///
/// Assigned once when the activity is created and never reassigned,
/// including across tokenization round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActivityId(pub String);

impl ActivityId {
    /// Create an activity ID from a caller-assigned string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random activity ID
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the ID as a string slice
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActivityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActivityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Behaviour-specific state of an activity
///
/// Implemented by the concrete activity types of the host's catalogue. The
/// core never executes a behaviour itself; it only needs the type tag and the
/// persisted properties.
pub trait ActivityBehavior: fmt::Debug + Send + Sync {
    /// The behaviour-type name used to resolve this activity through the catalogue
    fn activity_type(&self) -> &str;

    /// Persisted state of the activity as a JSON object
    ///
    /// Must not contain the reserved `id` and `name` keys.
    fn properties(&self) -> Map<String, Value>;

    /// Update a single property during execution
    fn set_property(&mut self, name: &str, value: Value) -> Result<(), CoreError>;

    /// Clone into a new boxed behaviour
    fn box_clone(&self) -> Box<dyn ActivityBehavior>;
}

impl Clone for Box<dyn ActivityBehavior> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Generic behaviour that keeps its properties verbatim
///
/// Suitable for data-only activity types whose semantics live entirely in the
/// invoker.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBagActivity {
    activity_type: String,
    properties: Map<String, Value>,
}

impl PropertyBagActivity {
    /// Create a property bag of the given type with no properties
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            properties: Map::new(),
        }
    }

    /// Create a property bag from an existing property map, rejecting reserved keys
    pub fn with_properties(
        activity_type: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Result<Self, CoreError> {
        let mut bag = Self::new(activity_type);
        for (name, value) in properties {
            bag.set_property(&name, value)?;
        }
        Ok(bag)
    }

    /// Add a property, builder style
    pub fn with(mut self, name: &str, value: Value) -> Self {
        if !is_reserved_key(name) {
            self.properties.insert(name.to_string(), value);
        }
        self
    }

    /// Read a single property
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }
}

impl ActivityBehavior for PropertyBagActivity {
    fn activity_type(&self) -> &str {
        &self.activity_type
    }

    fn properties(&self) -> Map<String, Value> {
        self.properties.clone()
    }

    fn set_property(&mut self, name: &str, value: Value) -> Result<(), CoreError> {
        if is_reserved_key(name) {
            return Err(CoreError::ActivityTypeError(format!(
                "Property '{}' is reserved on activity type {}",
                name, self.activity_type
            )));
        }
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    fn box_clone(&self) -> Box<dyn ActivityBehavior> {
        Box::new(self.clone())
    }
}

/// Placeholder for an activity whose behaviour type could not be resolved
///
/// Holds the complete document entry so that re-serialization reproduces it
/// unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownActivity {
    /// Behaviour-type name that failed to resolve
    pub name: String,
    /// Raw document fields, including `id` and `name`
    pub raw: Map<String, Value>,
}

/// Concrete representation of an activity
#[derive(Debug, Clone)]
pub enum ActivityKind {
    /// A resolved behaviour type
    Behavior(Box<dyn ActivityBehavior>),
    /// Unresolvable behaviour type, kept as raw state
    Unknown(UnknownActivity),
}

/// Entity: Activity
#[derive(Debug, Clone)]
pub struct Activity {
    id: ActivityId,
    kind: ActivityKind,
}

impl Activity {
    /// Create an activity from a behaviour
    pub fn new(id: impl Into<ActivityId>, behavior: impl ActivityBehavior + 'static) -> Self {
        Self::from_boxed(id, Box::new(behavior))
    }

    /// Create an activity from a boxed behaviour
    pub fn from_boxed(id: impl Into<ActivityId>, behavior: Box<dyn ActivityBehavior>) -> Self {
        Self {
            id: id.into(),
            kind: ActivityKind::Behavior(behavior),
        }
    }

    /// Create a placeholder activity preserving the given raw document entry
    pub fn unknown(id: impl Into<ActivityId>, unknown: UnknownActivity) -> Self {
        Self {
            id: id.into(),
            kind: ActivityKind::Unknown(unknown),
        }
    }

    /// Stable activity ID
    #[inline]
    pub fn id(&self) -> &ActivityId {
        &self.id
    }

    /// Behaviour-type name
    pub fn name(&self) -> &str {
        match &self.kind {
            ActivityKind::Behavior(behavior) => behavior.activity_type(),
            ActivityKind::Unknown(unknown) => &unknown.name,
        }
    }

    /// Concrete representation
    #[inline]
    pub fn kind(&self) -> &ActivityKind {
        &self.kind
    }

    /// Check if this is the placeholder variant
    #[inline]
    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, ActivityKind::Unknown(_))
    }

    /// Borrow the resolved behaviour, if any
    pub fn behavior(&self) -> Option<&dyn ActivityBehavior> {
        match &self.kind {
            ActivityKind::Behavior(behavior) => Some(behavior.as_ref()),
            ActivityKind::Unknown(_) => None,
        }
    }

    /// Mutably borrow the resolved behaviour, if any
    pub fn behavior_mut(&mut self) -> Option<&mut (dyn ActivityBehavior + 'static)> {
        match &mut self.kind {
            ActivityKind::Behavior(behavior) => Some(behavior.as_mut()),
            ActivityKind::Unknown(_) => None,
        }
    }

    /// Persisted properties, excluding the reserved `id` and `name` keys
    pub fn properties(&self) -> Map<String, Value> {
        match &self.kind {
            ActivityKind::Behavior(behavior) => behavior.properties(),
            ActivityKind::Unknown(unknown) => unknown
                .raw
                .iter()
                .filter(|(key, _)| !is_reserved_key(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }

    /// Compare the observable state of two activities
    ///
    /// Two activities are equivalent when ID, type name and properties match,
    /// regardless of the concrete behaviour object behind them.
    pub fn is_equivalent(&self, other: &Activity) -> bool {
        self.id == other.id
            && self.name() == other.name()
            && self.properties() == other.properties()
    }
}

/// Check if a property name collides with the document's identity keys
#[inline]
pub fn is_reserved_key(key: &str) -> bool {
    key == ACTIVITY_ID_KEY || key == ACTIVITY_NAME_KEY
}
