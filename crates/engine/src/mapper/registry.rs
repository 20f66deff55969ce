//! Model registry
//!
//! Maps model names to compiled schemas. One registry belongs to one
//! `Mapper` and is handed by reference to the components that look up
//! other models (population, cascading saves and removes). There is no
//! process-wide registry.
//!
//! Uses parking_lot::RwLock; lookups vastly outnumber registrations.

use parking_lot::RwLock;
use settee_schema::Schema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Registered models by name
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: RwLock<HashMap<String, Arc<Schema>>>,
}

impl ModelRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compiled schema under its model name
    ///
    /// A model registered again replaces the previous schema; documents
    /// created before keep the schema they were created with.
    pub fn register(&self, schema: Schema) -> Arc<Schema> {
        let schema = Arc::new(schema);
        let previous = self
            .models
            .write()
            .insert(schema.name().to_string(), Arc::clone(&schema));
        info!(
            target: "settee::schema",
            model = %schema.name(),
            replaced = previous.is_some(),
            "Registered model"
        );
        schema
    }

    /// Schema of `name`
    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.models.read().get(name).cloned()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.models.read().contains_key(name)
    }

    /// Registered model names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered models
    pub fn len(&self) -> usize {
        self.models.read().len()
    }

    /// Check if no model is registered
    pub fn is_empty(&self) -> bool {
        self.models.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use settee_schema::{Descriptor, SchemaBuilder};

    fn schema(name: &str) -> Schema {
        SchemaBuilder::new(name)
            .field("name", Descriptor::string())
            .compile("_")
            .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = ModelRegistry::new();
        assert!(registry.is_empty());
        registry.register(schema("User"));
        registry.register(schema("Post"));

        assert!(registry.contains("User"));
        assert_eq!(registry.get("Post").unwrap().name(), "Post");
        assert!(registry.get("Comment").is_none());
        assert_eq!(registry.names(), vec!["Post".to_string(), "User".to_string()]);
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = ModelRegistry::new();
        let first = registry.register(schema("User"));
        let second = registry.register(schema("User"));
        assert_eq!(registry.len(), 1);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&registry.get("User").unwrap(), &second));
    }
}
