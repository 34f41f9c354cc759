//! Activity catalogue
//!
//! Maps behaviour-type names to descriptors that can materialize a concrete
//! behaviour from persisted properties. The catalogue itself is supplied by
//! the host; [`ActivityRegistry`] is a table-backed implementation.

use crate::domain::activity::{ActivityBehavior, PropertyBagActivity};
use crate::CoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Describes one concrete activity type
pub trait ActivityDescriptor: Debug + Send + Sync {
    /// The behaviour-type name this descriptor resolves
    fn activity_type(&self) -> &str;

    /// Build a behaviour from persisted properties (without `id` and `name`)
    fn instantiate(
        &self,
        properties: Map<String, Value>,
    ) -> Result<Box<dyn ActivityBehavior>, CoreError>;
}

/// Lookup service resolving behaviour-type names
#[async_trait]
pub trait ActivityCatalogue: Send + Sync {
    /// Resolve a type name; `Ok(None)` means the type is unknown to this catalogue
    async fn lookup_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<dyn ActivityDescriptor>>, CoreError>;
}

/// Descriptor producing [`PropertyBagActivity`] behaviours
#[derive(Debug, Clone)]
pub struct PropertyBagDescriptor {
    activity_type: String,
}

impl PropertyBagDescriptor {
    /// Create a descriptor for the given type name
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
        }
    }
}

impl ActivityDescriptor for PropertyBagDescriptor {
    fn activity_type(&self) -> &str {
        &self.activity_type
    }

    fn instantiate(
        &self,
        properties: Map<String, Value>,
    ) -> Result<Box<dyn ActivityBehavior>, CoreError> {
        Ok(Box::new(PropertyBagActivity::with_properties(
            self.activity_type.clone(),
            properties,
        )?))
    }
}

/// Table-backed activity catalogue
#[derive(Debug, Default, Clone)]
pub struct ActivityRegistry {
    descriptors: HashMap<String, Arc<dyn ActivityDescriptor>>,
}

impl ActivityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor, replacing any previous one with the same type name
    pub fn register(&mut self, descriptor: Arc<dyn ActivityDescriptor>) {
        let name = descriptor.activity_type().to_string();
        debug!(activity_type = %name, "Registering activity type");
        self.descriptors.insert(name, descriptor);
    }

    /// Register a descriptor, builder style
    pub fn with(mut self, descriptor: Arc<dyn ActivityDescriptor>) -> Self {
        self.register(descriptor);
        self
    }

    /// Register a property-bag type, builder style
    pub fn with_property_bag(self, activity_type: &str) -> Self {
        self.with(Arc::new(PropertyBagDescriptor::new(activity_type)))
    }

    /// Remove a type; later lookups for it resolve to nothing
    pub fn unregister(&mut self, activity_type: &str) -> Option<Arc<dyn ActivityDescriptor>> {
        self.descriptors.remove(activity_type)
    }

    /// Check if a type name is registered
    pub fn contains(&self, activity_type: &str) -> bool {
        self.descriptors.contains_key(activity_type)
    }

    /// Registered type names, sorted
    pub fn activity_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[async_trait]
impl ActivityCatalogue for ActivityRegistry {
    async fn lookup_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<dyn ActivityDescriptor>>, CoreError> {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled(format!(
                "lookup of activity type {}",
                name
            )));
        }
        Ok(self.descriptors.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = ActivityRegistry::new()
            .with_property_bag("WriteLine")
            .with_property_bag("Delay");
        let cancel = CancellationToken::new();

        let descriptor = registry
            .lookup_by_name("WriteLine", &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.activity_type(), "WriteLine");

        assert!(registry
            .lookup_by_name("Removed", &cancel)
            .await
            .unwrap()
            .is_none());
        assert_eq!(registry.activity_types(), vec!["Delay", "WriteLine"]);
    }

    #[tokio::test]
    async fn test_registry_honors_cancellation() {
        let registry = ActivityRegistry::new().with_property_bag("WriteLine");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = registry.lookup_by_name("WriteLine", &cancel).await;
        assert!(matches!(result, Err(CoreError::Cancelled(_))));
    }

    #[test]
    fn test_property_bag_descriptor_instantiates_behavior() {
        let descriptor = PropertyBagDescriptor::new("WriteLine");
        let mut props = Map::new();
        props.insert("text".to_string(), json!("hi"));

        let behavior = descriptor.instantiate(props).unwrap();
        assert_eq!(behavior.activity_type(), "WriteLine");
        assert_eq!(behavior.properties().get("text"), Some(&json!("hi")));
    }

    #[test]
    fn test_unregister() {
        let mut registry = ActivityRegistry::new().with_property_bag("WriteLine");
        assert!(registry.contains("WriteLine"));
        assert!(registry.unregister("WriteLine").is_some());
        assert!(!registry.contains("WriteLine"));

        let lookup = block_on(registry.lookup_by_name("WriteLine", &CancellationToken::new()));
        assert!(lookup.unwrap().is_none());
    }
}
