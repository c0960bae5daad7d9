//! Resource - the caller-facing object
//!
//! Wraps an attribute bag, the installed associations and the lifecycle
//! calls (`find`, `all`, `reload`, `save`, `delete`) of one resource.

use super::attributes::AttributeStore;
use super::collaborator::WriteMethod;
use super::factory::{insert_path, take_path, ResourceFactory};
use super::lazy::{extract_items, LazyAssociation, Resolved};
use super::registry::ResourceType;
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Attributes the server owns and never accepts back
const READONLY_ATTRIBUTES: &[&str] = &["self", "expand"];

/// A materialised resource of some [`ResourceType`].
///
/// Cloning shares the association caches of the original.
#[derive(Clone)]
pub struct Resource {
    resource_type: Arc<ResourceType>,
    key: Option<String>,
    attrs: AttributeStore,
    associations: BTreeMap<String, LazyAssociation>,
    factory: ResourceFactory,
    expanded: bool,
    deleted: bool,
}

impl Resource {
    pub(crate) fn from_parts(
        resource_type: Arc<ResourceType>,
        key: Option<String>,
        attrs: AttributeStore,
        associations: BTreeMap<String, LazyAssociation>,
        factory: ResourceFactory,
    ) -> Self {
        Self {
            resource_type,
            key,
            attrs,
            associations,
            factory,
            expanded: false,
            deleted: false,
        }
    }

    /// GET a single resource by key
    pub async fn find(factory: &ResourceFactory, type_name: &str, key: &str) -> Result<Self> {
        let resource_type = factory.resource_type(type_name)?;
        let path = resource_type.item_path(key)?;
        let operation = format!("{}.find", resource_type.name);

        let body = factory
            .client()
            .fetch(&path)
            .await
            .map_err(|e| Error::resolution(&operation, e))?;

        let mut resource = factory.build_typed(resource_type, Some(key), body)?;
        resource.expanded = true;
        Ok(resource)
    }

    /// GET the full collection of a type
    pub async fn all(factory: &ResourceFactory, type_name: &str) -> Result<Vec<Self>> {
        let resource_type = factory.resource_type(type_name)?;
        let path = resource_type.collection_path(None);
        let operation = format!("{}.all", resource_type.name);

        let body = factory
            .client()
            .fetch(&path)
            .await
            .map_err(|e| Error::resolution(&operation, e))?;

        let items = extract_items(body, &resource_type.response_path, &path)
            .map_err(|e| Error::resolution(&operation, e))?;

        factory.build_all(&resource_type, items)
    }

    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    pub fn type_name(&self) -> &str {
        &self.resource_type.name
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Item path, for saved resources
    pub fn url(&self) -> Result<String> {
        match self.key {
            Some(ref key) => self.resource_type.item_path(key),
            None => Err(Error::validation(
                &self.resource_type.name,
                "resource has no key yet",
            )),
        }
    }

    pub fn is_new_record(&self) -> bool {
        self.key.is_none()
    }

    /// Whether the attributes came from a direct GET of this resource
    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attrs(&self) -> &AttributeStore {
        &self.attrs
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn get_path(&self, path: &str) -> Option<&Value> {
        self.attrs.get_path(path)
    }

    /// Set a plain attribute. Associations are read-only.
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        if self.is_association_key(key) {
            return Err(Error::validation(
                &self.resource_type.name,
                format!("'{}' is an association and cannot be assigned", key),
            ));
        }
        self.attrs.set(key, value);
        Ok(())
    }

    /// Merge a JSON object into the attributes.
    ///
    /// `clobber` replaces top-level keys; otherwise nested objects merge.
    /// Association data in `value` is ignored.
    pub fn set_attrs(&mut self, value: Value, clobber: bool) -> Result<()> {
        let Value::Object(mut map) = value else {
            return Err(Error::validation(
                &self.resource_type.name,
                "attributes must be a JSON object",
            ));
        };
        self.strip_associations(&mut map);
        self.attrs.merge(map, clobber);
        Ok(())
    }

    fn is_association_key(&self, key: &str) -> bool {
        self.resource_type
            .associations
            .iter()
            .any(|a| a.nested_under.is_none() && a.json_key() == key)
    }

    fn strip_associations(&self, map: &mut Map<String, Value>) {
        for definition in &self.resource_type.associations {
            take_path(map, &definition.json_path());
        }
    }

    // =========================================================================
    // Associations
    // =========================================================================

    pub fn association(&self, name: &str) -> Result<&LazyAssociation> {
        self.associations.get(name).ok_or_else(|| {
            Error::validation(
                &self.resource_type.name,
                format!("no association named '{}'", name),
            )
        })
    }

    pub fn associations(&self) -> impl Iterator<Item = &LazyAssociation> {
        self.associations.values()
    }

    /// Resolve a `one` association by name
    pub async fn one(&self, name: &str) -> Result<Option<Resource>> {
        self.association(name)?.one().await
    }

    /// Resolve a `many` association by name
    pub async fn many(&self, name: &str) -> Result<Vec<Resource>> {
        self.association(name)?.many().await
    }

    /// Resolve every association concurrently
    pub async fn preload(&self) -> Result<BTreeMap<String, Resolved>> {
        let names: Vec<String> = self.associations.keys().cloned().collect();
        let values =
            futures::future::try_join_all(self.associations.values().map(|a| a.resolve()))
                .await?;
        Ok(names.into_iter().zip(values).collect())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// GET the item path unless the attributes are already expanded
    pub async fn fetch(&mut self) -> Result<()> {
        if self.expanded {
            return Ok(());
        }
        self.reload().await
    }

    /// GET the item path and rebuild attributes and associations.
    ///
    /// This is the only point where resolved associations are invalidated.
    pub async fn reload(&mut self) -> Result<()> {
        self.ensure_live("reload")?;
        let path = self.url()?;
        let operation = format!("{}.reload", self.resource_type.name);

        let body = self
            .factory
            .client()
            .fetch(&path)
            .await
            .map_err(|e| Error::resolution(&operation, e))?;

        let fresh = self
            .factory
            .build_typed(self.resource_type.clone(), self.key.as_deref(), body)?;
        self.attrs = fresh.attrs;
        self.associations = fresh.associations;
        self.expanded = true;
        Ok(())
    }

    /// POST a new resource or PUT an existing one, merging the response
    pub async fn save(&mut self) -> Result<()> {
        self.ensure_live("save")?;
        let (method, path) = match self.key {
            Some(ref key) => (WriteMethod::Put, self.resource_type.item_path(key)?),
            None => (WriteMethod::Post, self.resource_type.collection_path(None)),
        };
        let operation = format!("{}.save", self.resource_type.name);
        let body = self.writable_json();

        tracing::info!("{} {} ({})", method, path, self.resource_type.name);
        let response = self
            .factory
            .client()
            .write(&path, method, Some(&body))
            .await
            .map_err(|e| Error::resolution(&operation, e))?;

        if let Value::Object(mut map) = response {
            self.strip_associations(&mut map);
            self.attrs.merge(map, false);
        }

        if self.key.is_none() {
            self.key = self
                .attrs
                .get_str(&self.resource_type.key_attribute)
                .filter(|k| !k.is_empty());
            if self.key.is_some() {
                self.rewire()?;
            }
        }
        self.expanded = false;
        Ok(())
    }

    /// Reinstall associations from their payloads under the current key
    fn rewire(&mut self) -> Result<()> {
        let Value::Object(mut map) = self.to_json() else {
            return Ok(());
        };
        self.associations =
            self.factory
                .wire_associations(&self.resource_type, self.key.as_deref(), &mut map)?;
        Ok(())
    }

    /// DELETE the item path
    pub async fn delete(&mut self) -> Result<()> {
        self.ensure_live("delete")?;
        let path = self.url()?;
        let operation = format!("{}.delete", self.resource_type.name);

        tracing::info!("DELETE {} ({})", path, self.resource_type.name);
        self.factory
            .client()
            .write(&path, WriteMethod::Delete, None)
            .await
            .map_err(|e| Error::resolution(&operation, e))?;

        self.deleted = true;
        Ok(())
    }

    fn ensure_live(&self, action: &str) -> Result<()> {
        if self.deleted {
            return Err(Error::validation(
                &self.resource_type.name,
                format!("cannot {} a deleted resource", action),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Attributes with association payloads put back where they came from
    pub fn to_json(&self) -> Value {
        let mut map = self.attrs.as_map().clone();
        for association in self.associations.values() {
            if let Some(raw) = association.raw() {
                insert_path(&mut map, &association.definition().json_path(), raw.clone());
            }
        }
        Value::Object(map)
    }

    fn writable_json(&self) -> Value {
        let mut value = self.to_json();
        if let Value::Object(ref mut map) = value {
            for key in READONLY_ATTRIBUTES {
                map.remove(*key);
            }
        }
        value
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(ref key) => write!(f, "{}({})", self.resource_type.name, key),
            None => write!(f, "{}(new)", self.resource_type.name),
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("type", &self.resource_type.name)
            .field("key", &self.key)
            .field("attrs", &self.attrs)
            .field("associations", &self.associations)
            .finish()
    }
}
