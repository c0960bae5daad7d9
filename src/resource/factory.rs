//! Resource Factory
//!
//! Builds resources from decoded JSON and wires their declared associations.

use super::attributes::{scalar_to_string, AttributeStore};
use super::base::Resource;
use super::collaborator::Collaborator;
use super::identity::validate_key;
use super::lazy::{reference_key, LazyAssociation, Source};
use super::registry::{AssociationDef, Cardinality, ResourceType, TypeRef, TypeRegistry};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Keys an embedded object may carry while still being a bare reference
const REFERENCE_KEYS: &[&str] = &["id", "key", "self"];

/// Builds resources of any registered type.
///
/// Cloning is cheap; every resource keeps a clone so that its associations
/// can fetch and build their targets later.
#[derive(Clone)]
pub struct ResourceFactory {
    client: Arc<dyn Collaborator>,
    registry: Arc<TypeRegistry>,
}

impl ResourceFactory {
    pub fn new(client: Arc<dyn Collaborator>, registry: Arc<TypeRegistry>) -> Self {
        Self { client, registry }
    }

    /// Factory over the bundled JIRA catalogue
    pub fn with_builtin_types(client: Arc<dyn Collaborator>) -> Self {
        Self::new(client, Arc::new(TypeRegistry::builtin()))
    }

    pub fn client(&self) -> &Arc<dyn Collaborator> {
        &self.client
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Look up a type by name
    pub fn resource_type(&self, type_name: &str) -> Result<Arc<ResourceType>> {
        self.registry.resolve(&TypeRef::named(type_name))
    }

    /// Build a resource from a JSON object.
    ///
    /// `key` overrides the type's key attribute in `json`. Fails with a
    /// validation error when the type requires a key and none is found.
    pub fn build(&self, type_name: &str, key: Option<&str>, json: Value) -> Result<Resource> {
        let resource_type = self.resource_type(type_name)?;
        self.build_typed(resource_type, key, json)
    }

    /// Build an unsaved resource; `save` will POST it to the collection
    pub fn build_new(&self, type_name: &str, json: Value) -> Result<Resource> {
        let resource_type = self.resource_type(type_name)?;
        self.assemble(resource_type, None, json, false)
    }

    /// Build one resource per array element, preserving order
    pub fn build_many(&self, type_name: &str, items: Vec<Value>) -> Result<Vec<Resource>> {
        let resource_type = self.resource_type(type_name)?;
        self.build_all(&resource_type, items)
    }

    pub(crate) fn build_all(
        &self,
        resource_type: &Arc<ResourceType>,
        items: Vec<Value>,
    ) -> Result<Vec<Resource>> {
        items
            .into_iter()
            .map(|item| self.build_embedded(resource_type.clone(), item))
            .collect()
    }

    /// Build from data embedded in another payload; partial objects are
    /// common there, so a key is never required
    pub(crate) fn build_embedded(
        &self,
        resource_type: Arc<ResourceType>,
        json: Value,
    ) -> Result<Resource> {
        self.assemble(resource_type, None, json, false)
    }

    pub(crate) fn build_typed(
        &self,
        resource_type: Arc<ResourceType>,
        key: Option<&str>,
        json: Value,
    ) -> Result<Resource> {
        let require_key = resource_type.key_required;
        self.assemble(resource_type, key, json, require_key)
    }

    fn assemble(
        &self,
        resource_type: Arc<ResourceType>,
        key: Option<&str>,
        json: Value,
        require_key: bool,
    ) -> Result<Resource> {
        let Value::Object(mut map) = json else {
            return Err(Error::validation(
                &resource_type.name,
                "payload is not a JSON object",
            ));
        };

        let key = key
            .map(str::to_string)
            .or_else(|| map.get(&resource_type.key_attribute).and_then(scalar_to_string))
            .filter(|k| !k.trim().is_empty());

        if require_key && key.is_none() {
            return Err(Error::validation(
                &resource_type.name,
                format!("missing key attribute '{}'", resource_type.key_attribute),
            ));
        }

        let associations = self.wire_associations(&resource_type, key.as_deref(), &mut map)?;

        Ok(Resource::from_parts(
            resource_type,
            key,
            AttributeStore::from_map(map),
            associations,
            self.clone(),
        ))
    }

    /// Pull every declared association out of `map` and install it
    pub(crate) fn wire_associations(
        &self,
        resource_type: &Arc<ResourceType>,
        key: Option<&str>,
        map: &mut Map<String, Value>,
    ) -> Result<BTreeMap<String, LazyAssociation>> {
        let mut associations = BTreeMap::new();

        for definition in &resource_type.associations {
            let raw = take_path(map, &definition.json_path());
            let association = self.install(resource_type, key, definition, raw)?;
            associations.insert(definition.name.clone(), association);
        }

        Ok(associations)
    }

    fn install(
        &self,
        owner: &Arc<ResourceType>,
        owner_key: Option<&str>,
        definition: &AssociationDef,
        raw: Option<Value>,
    ) -> Result<LazyAssociation> {
        let lazy = |source: Source, raw: Option<Value>| {
            LazyAssociation::new(
                owner.clone(),
                owner_key.map(str::to_string),
                definition.clone(),
                source,
                raw,
                self.clone(),
            )
        };

        match (definition.cardinality, raw) {
            (Cardinality::One, None) => Ok(lazy(Source::Absent, None)),
            (Cardinality::One, Some(Value::Null)) => Ok(lazy(Source::Absent, Some(Value::Null))),
            (Cardinality::One, Some(Value::Object(obj))) if is_reference(&obj) => {
                let raw = Value::Object(obj);
                self.check_reference(owner, definition, &raw)?;
                Ok(lazy(Source::Reference(raw.clone()), Some(raw)))
            }
            (Cardinality::One, Some(Value::Object(obj))) => {
                let raw = Value::Object(obj);
                // An unregistered target keeps its payload until first access
                match self.registry.resolve(&definition.target) {
                    Ok(target) => {
                        let resource = self.build_embedded(target, raw.clone())?;
                        Ok(lazy(Source::Built(Some(resource)), Some(raw)))
                    }
                    Err(_) => Ok(lazy(Source::Inline(raw.clone()), Some(raw))),
                }
            }
            (Cardinality::One, Some(Value::Array(_))) => Err(Error::validation(
                &owner.name,
                format!("association '{}' expects an object or a key", definition.name),
            )),
            (Cardinality::One, Some(scalar)) => {
                self.check_reference(owner, definition, &scalar)?;
                Ok(lazy(Source::Reference(scalar.clone()), Some(scalar)))
            }
            (Cardinality::Many, None) => Ok(lazy(Source::Collection, None)),
            (Cardinality::Many, Some(Value::Null)) => {
                Ok(lazy(Source::BuiltMany(Vec::new()), Some(Value::Null)))
            }
            (Cardinality::Many, Some(Value::Array(items))) => {
                let raw = Value::Array(items.clone());
                match self.registry.resolve(&definition.target) {
                    Ok(target) => {
                        let resources = self.build_all(&target, items)?;
                        Ok(lazy(Source::BuiltMany(resources), Some(raw)))
                    }
                    Err(_) => Ok(lazy(Source::Inline(raw.clone()), Some(raw))),
                }
            }
            (Cardinality::Many, Some(_)) => Err(Error::validation(
                &owner.name,
                format!("association '{}' expects an array", definition.name),
            )),
        }
    }
}

impl ResourceFactory {
    /// A reference must carry a usable key for its target.
    ///
    /// Unregistered targets are checked when the association is accessed.
    fn check_reference(
        &self,
        owner: &ResourceType,
        definition: &AssociationDef,
        reference: &Value,
    ) -> Result<()> {
        let Ok(target) = self.registry.resolve(&definition.target) else {
            return Ok(());
        };
        let key = reference_key(reference, &target.key_attribute).ok_or_else(|| {
            Error::validation(
                &owner.name,
                format!("reference '{}' carries no key", definition.name),
            )
        })?;
        validate_key(&key)
    }
}

/// Whether an embedded object only identifies its target
fn is_reference(obj: &Map<String, Value>) -> bool {
    !obj.is_empty() && obj.keys().all(|k| REFERENCE_KEYS.contains(&k.as_str()))
}

/// Remove and return the value at `path`, walking nested objects
pub(crate) fn take_path(map: &mut Map<String, Value>, path: &[&str]) -> Option<Value> {
    let (last, parents) = path.split_last()?;
    let mut current = map;
    for part in parents {
        current = current.get_mut(*part)?.as_object_mut()?;
    }
    current.remove(*last)
}

/// Insert `value` at `path`, creating enclosing objects as needed
pub(crate) fn insert_path(map: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for part in parents {
        let slot = current
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = match slot.as_object_mut() {
            Some(obj) => obj,
            None => return,
        };
    }
    current.insert(last.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockClient;
    use crate::resource::lazy::AssociationState;
    use serde_json::json;

    fn factory() -> ResourceFactory {
        ResourceFactory::with_builtin_types(Arc::new(MockClient::new()))
    }

    #[test]
    fn test_plain_keys_copied_verbatim() {
        let status = factory()
            .build(
                "Status",
                None,
                json!({"id": "1", "name": "Open", "iconUrl": "http://x/open.png"}),
            )
            .unwrap();

        assert_eq!(status.key(), Some("1"));
        assert_eq!(status.get("name"), Some(&json!("Open")));
        assert_eq!(status.get("iconUrl"), Some(&json!("http://x/open.png")));
    }

    #[test]
    fn test_missing_key_is_validation_error() {
        let err = factory()
            .build("Status", None, json!({"name": "Open"}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = factory()
            .build("Status", Some(""), json!({"id": ""}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_non_object_payload_is_rejected() {
        let err = factory().build("Status", Some("1"), json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_explicit_key_overrides_payload() {
        let status = factory()
            .build("Status", Some("7"), json!({"name": "Done"}))
            .unwrap();
        assert_eq!(status.key(), Some("7"));
    }

    #[test]
    fn test_association_keys_leave_the_attribute_bag() {
        let issue = factory()
            .build(
                "Issue",
                None,
                json!({
                    "id": "10002",
                    "key": "PROJ-1",
                    "fields": {
                        "summary": "Crash on save",
                        "status": {"id": "1", "name": "Open"},
                        "fixVersions": [{"id": "100", "name": "1.0"}]
                    }
                }),
            )
            .unwrap();

        assert_eq!(issue.key(), Some("PROJ-1"));
        assert_eq!(issue.get_path("fields.summary"), Some(&json!("Crash on save")));
        assert_eq!(issue.get_path("fields.status"), None);
        assert_eq!(issue.get_path("fields.fixVersions"), None);

        let status = issue.association("status").unwrap();
        assert_eq!(status.state(), AssociationState::Resolved);
        let versions = issue.association("versions").unwrap();
        assert_eq!(versions.state(), AssociationState::Resolved);
    }

    #[test]
    fn test_bare_reference_stays_unresolved() {
        let link = factory()
            .build(
                "Issuelink",
                None,
                json!({"id": "10001", "inwardIssue": {"key": "PROJ-2"}, "outwardIssue": "PROJ-3"}),
            )
            .unwrap();

        assert_eq!(
            link.association("inwardIssue").unwrap().state(),
            AssociationState::Unresolved
        );
        assert_eq!(
            link.association("outwardIssue").unwrap().state(),
            AssociationState::Unresolved
        );
        // Absent one-association is resolved to nothing without I/O
        assert_eq!(
            link.association("type").unwrap().state(),
            AssociationState::Resolved
        );
    }

    #[test]
    fn test_reference_without_key_fails_build() {
        let err = factory()
            .build(
                "Issuelink",
                None,
                json!({"id": "1", "inwardIssue": {"self": "http://jira/rest/api/2/issue/10"}}),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(!err.is_retryable());

        let err = factory()
            .build("Issuelink", None, json!({"id": "1", "outwardIssue": ""}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_reference_key_with_separator_fails_build() {
        let err = factory()
            .build("Issuelink", None, json!({"id": "1", "outwardIssue": "A/B"}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { ref key, .. } if key == "A/B"));
        assert!(!err.is_retryable());

        let err = factory()
            .build("Issuelink", None, json!({"id": "1", "inwardIssue": {"key": " "}}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_inline_target_without_key_builds() {
        let link = factory()
            .build(
                "Issuelink",
                None,
                json!({"id": "10001", "type": {"name": "Blocks"}}),
            )
            .unwrap();

        let link_type = link.one("type").await.unwrap().unwrap();
        assert_eq!(link_type.key(), None);
        assert_eq!(link_type.get("name"), Some(&json!("Blocks")));
    }

    #[test]
    fn test_invalid_inline_target_fails_build() {
        let err = factory()
            .build(
                "Issuelink",
                None,
                json!({"id": "10001", "inwardIssue": {"key": "P-1", "fields": {"components": 3}}}),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_many_association_rejects_scalar() {
        let err = factory()
            .build("Issue", None, json!({"key": "PROJ-1", "fields": {"components": "x"}}))
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[test]
    fn test_build_new_allows_missing_key() {
        let link = factory()
            .build_new(
                "Issuelink",
                json!({"type": {"name": "Duplicate"}, "inwardIssue": {"key": "HSP-1"}}),
            )
            .unwrap();
        assert!(link.is_new_record());
    }

    #[test]
    fn test_take_and_insert_path() {
        let mut map = json!({"fields": {"comment": {"comments": [1], "total": 1}}})
            .as_object()
            .unwrap()
            .clone();

        let taken = take_path(&mut map, &["fields", "comment", "comments"]);
        assert_eq!(taken, Some(json!([1])));
        assert_eq!(take_path(&mut map, &["fields", "missing", "x"]), None);

        insert_path(&mut map, &["fields", "comment", "comments"], json!([2]));
        insert_path(&mut map, &["top"], json!("v"));
        assert_eq!(
            Value::Object(map),
            json!({"fields": {"comment": {"comments": [2], "total": 1}}, "top": "v"})
        );
    }
}
