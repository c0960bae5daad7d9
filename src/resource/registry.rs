//! Resource Registry - declarative resource types and their associations
//!
//! Each resource type is a data-driven descriptor: an endpoint, a key
//! attribute and a table of association definitions. Association targets are
//! symbolic type names, resolved against the registry only when an
//! association is dereferenced, so two types may reference each other
//! regardless of declaration order.
//!
//! The bundled JIRA catalogue is loaded from embedded JSON.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/jira.json")];

/// Association cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// Forward-declared reference to a resource type, by name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeRef(String);

impl TypeRef {
    pub fn named(name: &str) -> Self {
        Self(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TypeRef {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Association definition from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationDef {
    /// Accessor name; also the JSON key unless `attribute_key` is set
    pub name: String,
    pub cardinality: Cardinality,
    pub target: TypeRef,
    /// JSON key when it differs from the accessor name
    #[serde(default)]
    pub attribute_key: Option<String>,
    /// Dot path of the object enclosing the association data (e.g. `fields`)
    #[serde(default)]
    pub nested_under: Option<String>,
    /// Collection lives under the owner's item path
    #[serde(default)]
    pub scoped: bool,
    /// Query parameter receiving the owner key when fetching the collection
    #[serde(default)]
    pub filter_param: Option<String>,
    /// Dot path of the item array inside a collection response
    #[serde(default)]
    pub response_path: String,
}

impl AssociationDef {
    pub fn new(name: &str, cardinality: Cardinality, target: impl Into<TypeRef>) -> Self {
        Self {
            name: name.to_string(),
            cardinality,
            target: target.into(),
            attribute_key: None,
            nested_under: None,
            scoped: false,
            filter_param: None,
            response_path: String::new(),
        }
    }

    pub fn with_attribute_key(mut self, key: &str) -> Self {
        self.attribute_key = Some(key.to_string());
        self
    }

    pub fn nested_under(mut self, path: &str) -> Self {
        self.nested_under = Some(path.to_string());
        self
    }

    pub fn scoped(mut self) -> Self {
        self.scoped = true;
        self
    }

    pub fn with_filter_param(mut self, param: &str) -> Self {
        self.filter_param = Some(param.to_string());
        self
    }

    pub fn with_response_path(mut self, path: &str) -> Self {
        self.response_path = path.to_string();
        self
    }

    /// The JSON key holding this association's data
    pub fn json_key(&self) -> &str {
        self.attribute_key.as_deref().unwrap_or(&self.name)
    }

    /// Full path of the association data, enclosing objects first
    pub fn json_path(&self) -> Vec<&str> {
        let mut parts: Vec<&str> = self
            .nested_under
            .as_deref()
            .map(|p| p.split('.').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        parts.push(self.json_key());
        parts
    }
}

fn default_key_attribute() -> String {
    "id".to_string()
}

fn default_true() -> bool {
    true
}

/// Resource type definition from JSON
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResourceType {
    /// Filled from the catalogue map key
    #[serde(skip)]
    pub name: String,
    /// REST path segment when it does not follow the naming rule
    #[serde(default)]
    pub endpoint_name: Option<String>,
    #[serde(default = "default_key_attribute")]
    pub key_attribute: String,
    /// Whether building an instance from JSON requires a key
    #[serde(default = "default_true")]
    pub key_required: bool,
    /// Dot path of the item array when the collection body is an object
    #[serde(default)]
    pub response_path: String,
    #[serde(default)]
    pub associations: Vec<AssociationDef>,
}

impl ResourceType {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint_name: None,
            key_attribute: default_key_attribute(),
            key_required: true,
            response_path: String::new(),
            associations: Vec::new(),
        }
    }

    pub fn with_endpoint_name(mut self, endpoint: &str) -> Self {
        self.endpoint_name = Some(endpoint.to_string());
        self
    }

    pub fn with_key_attribute(mut self, attribute: &str) -> Self {
        self.key_attribute = attribute.to_string();
        self
    }

    pub fn with_response_path(mut self, path: &str) -> Self {
        self.response_path = path.to_string();
        self
    }

    pub fn optional_key(mut self) -> Self {
        self.key_required = false;
        self
    }

    pub fn association(&self, field: &str) -> Option<&AssociationDef> {
        self.associations.iter().find(|a| a.name == field)
    }

    fn check_unique(&self) -> Result<()> {
        for (i, assoc) in self.associations.iter().enumerate() {
            if self.associations[..i].iter().any(|a| a.name == assoc.name) {
                return Err(Error::validation(
                    &self.name,
                    format!("association '{}' declared twice", assoc.name),
                ));
            }
        }
        Ok(())
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
struct ResourceCatalogue {
    #[serde(default)]
    resources: HashMap<String, ResourceType>,
}

/// Registry of resource types keyed by type name
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, Arc<ResourceType>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh copy of the bundled JIRA catalogue
    pub fn builtin() -> Self {
        builtin_registry().clone()
    }

    /// Build a registry from a catalogue document
    pub fn from_json(content: &str) -> Result<Self> {
        let mut registry = Self::new();
        registry.extend_from_json(content)?;
        Ok(registry)
    }

    /// Add the types of a catalogue document to this registry.
    ///
    /// A type that is already registered is rejected, as with
    /// [`declare_type`](Self::declare_type). Nothing is added on error.
    pub fn extend_from_json(&mut self, content: &str) -> Result<()> {
        let catalogue: ResourceCatalogue = serde_json::from_str(content)?;

        let mut added = Vec::with_capacity(catalogue.resources.len());
        for (name, mut resource_type) in catalogue.resources {
            if self.types.contains_key(&name) {
                return Err(Error::validation(&name, "type declared twice"));
            }
            resource_type.name = name;
            resource_type.check_unique()?;
            added.push(resource_type);
        }

        for resource_type in added {
            self.types
                .insert(resource_type.name.clone(), Arc::new(resource_type));
        }
        Ok(())
    }

    /// Register a resource type descriptor
    pub fn declare_type(&mut self, resource_type: ResourceType) -> Result<()> {
        if resource_type.name.is_empty() {
            return Err(Error::validation("<unnamed>", "type name is empty"));
        }
        if self.types.contains_key(&resource_type.name) {
            return Err(Error::validation(
                &resource_type.name,
                "type declared twice",
            ));
        }
        resource_type.check_unique()?;
        tracing::debug!("Declared resource type {}", resource_type.name);
        self.types
            .insert(resource_type.name.clone(), Arc::new(resource_type));
        Ok(())
    }

    /// Declare an association on an already registered type.
    ///
    /// The target is not checked: it may name a type declared later.
    pub fn declare(
        &mut self,
        type_name: &str,
        field: &str,
        cardinality: Cardinality,
        target: impl Into<TypeRef>,
    ) -> Result<()> {
        self.declare_association(type_name, AssociationDef::new(field, cardinality, target))
    }

    /// Declare a fully specified association on an already registered type
    pub fn declare_association(&mut self, type_name: &str, definition: AssociationDef) -> Result<()> {
        let Some(resource_type) = self.types.get_mut(type_name) else {
            return Err(Error::validation(type_name, "type is not declared"));
        };

        if resource_type.association(&definition.name).is_some() {
            return Err(Error::validation(
                type_name,
                format!("association '{}' declared twice", definition.name),
            ));
        }

        tracing::debug!(
            "Declared {}.{} -> {} ({:?})",
            type_name,
            definition.name,
            definition.target,
            definition.cardinality
        );
        Arc::make_mut(resource_type).associations.push(definition);
        Ok(())
    }

    /// Look up an association definition
    pub fn lookup(&self, type_name: &str, field: &str) -> Option<&AssociationDef> {
        self.types.get(type_name)?.association(field)
    }

    /// Get a resource type by name
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name).map(|t| t.as_ref())
    }

    /// Resolve a symbolic type reference
    pub fn resolve(&self, target: &TypeRef) -> Result<Arc<ResourceType>> {
        self.types
            .get(target.name())
            .cloned()
            .ok_or_else(|| Error::UnknownType(target.name().to_string()))
    }

    /// Get all type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// Get the bundled registry (loads from embedded JSON on first access)
pub fn builtin_registry() -> &'static TypeRegistry {
    REGISTRY.get_or_init(|| {
        let mut registry = TypeRegistry::new();
        for content in RESOURCE_FILES {
            registry
                .extend_from_json(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
        }
        registry
    })
}
