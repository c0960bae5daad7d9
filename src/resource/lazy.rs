//! Lazy associations
//!
//! A [`LazyAssociation`] stands in for one declared relationship of a
//! resource. Inline data is materialised at build time; references and
//! collections are fetched through the collaborator on first access and
//! cached for the lifetime of the association.
//!
//! State machine: `Unresolved -> Resolving -> Resolved | Failed`. A failed
//! resolution caches nothing, so the next access retries.

use super::base::Resource;
use super::factory::ResourceFactory;
use super::identity::with_query;
use super::registry::{AssociationDef, Cardinality, ResourceType};
use crate::error::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Observable state of an association
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Unresolved,
    /// A resolution is in flight
    Resolving,
    Resolved,
    Failed,
}

/// Value of a resolved association
#[derive(Debug, Clone)]
pub enum Resolved {
    One(Option<Resource>),
    Many(Vec<Resource>),
}

/// Where the association's value comes from
#[derive(Clone)]
pub(crate) enum Source {
    /// `one` with no data: resolves to nothing
    Absent,
    /// `one` holding a key or a key-only object
    Reference(Value),
    /// Inline payload whose target type was unknown at build time
    Inline(Value),
    /// Built eagerly from inline data
    Built(Option<Resource>),
    BuiltMany(Vec<Resource>),
    /// `many` with no data: fetched from the target's collection
    Collection,
}

enum Slot {
    Unresolved,
    Resolved(Resolved),
    Failed(String),
}

struct Inner {
    owner: Arc<ResourceType>,
    owner_key: Option<String>,
    definition: AssociationDef,
    source: Source,
    /// Payload as it appeared in the owner's JSON
    raw: Option<Value>,
    factory: ResourceFactory,
    // Held across the fetch: concurrent accessors wait for the first resolver
    slot: Mutex<Slot>,
}

/// Deferred accessor for one declared relationship.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct LazyAssociation {
    inner: Arc<Inner>,
}

impl LazyAssociation {
    pub(crate) fn new(
        owner: Arc<ResourceType>,
        owner_key: Option<String>,
        definition: AssociationDef,
        source: Source,
        raw: Option<Value>,
        factory: ResourceFactory,
    ) -> Self {
        let slot = initial_slot(&source);
        Self {
            inner: Arc::new(Inner {
                owner,
                owner_key,
                definition,
                source,
                raw,
                factory,
                slot: Mutex::new(slot),
            }),
        }
    }

    pub fn definition(&self) -> &AssociationDef {
        &self.inner.definition
    }

    pub fn name(&self) -> &str {
        &self.inner.definition.name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.inner.definition.cardinality
    }

    /// The association payload as received, if any
    pub fn raw(&self) -> Option<&Value> {
        self.inner.raw.as_ref()
    }

    /// Current state, without waiting on an in-flight resolution
    pub fn state(&self) -> AssociationState {
        match self.inner.slot.try_lock() {
            Err(_) => AssociationState::Resolving,
            Ok(slot) => match *slot {
                Slot::Unresolved => AssociationState::Unresolved,
                Slot::Resolved(_) => AssociationState::Resolved,
                Slot::Failed(_) => AssociationState::Failed,
            },
        }
    }

    /// Whether the next access performs I/O
    pub fn needs_fetch(&self) -> bool {
        self.state() != AssociationState::Resolved
            && matches!(
                self.inner.source,
                Source::Reference(_) | Source::Collection
            )
    }

    /// The cached value, if resolved
    pub fn cached(&self) -> Option<Resolved> {
        match self.inner.slot.try_lock() {
            Ok(slot) => match *slot {
                Slot::Resolved(ref value) => Some(value.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }

    /// Message of the last failed resolution
    pub fn last_error(&self) -> Option<String> {
        match self.inner.slot.try_lock() {
            Ok(slot) => match *slot {
                Slot::Failed(ref message) => Some(message.clone()),
                _ => None,
            },
            Err(_) => None,
        }
    }

    /// Resolve the association, fetching at most once.
    pub async fn resolve(&self) -> Result<Resolved> {
        let mut slot = self.inner.slot.lock().await;
        if let Slot::Resolved(ref value) = *slot {
            tracing::trace!("{} served from cache", self.operation());
            return Ok(value.clone());
        }

        tracing::debug!("Resolving {}", self.operation());
        match self.load().await {
            Ok(value) => {
                *slot = Slot::Resolved(value.clone());
                Ok(value)
            }
            Err(cause) => {
                tracing::warn!("Failed to resolve {}: {}", self.operation(), cause);
                *slot = Slot::Failed(cause.to_string());
                Err(Error::resolution(self.operation(), cause))
            }
        }
    }

    /// Resolve a `one` association
    pub async fn one(&self) -> Result<Option<Resource>> {
        match self.resolve().await? {
            Resolved::One(value) => Ok(value),
            Resolved::Many(_) => Err(self.wrong_cardinality()),
        }
    }

    /// Resolve a `many` association
    pub async fn many(&self) -> Result<Vec<Resource>> {
        match self.resolve().await? {
            Resolved::Many(values) => Ok(values),
            Resolved::One(_) => Err(self.wrong_cardinality()),
        }
    }

    /// Drop the cached value; the next access resolves again
    pub async fn reset(&self) {
        let mut slot = self.inner.slot.lock().await;
        *slot = initial_slot(&self.inner.source);
    }

    fn operation(&self) -> String {
        format!("{}.{}", self.inner.owner.name, self.inner.definition.name)
    }

    fn wrong_cardinality(&self) -> Error {
        Error::validation(
            &self.inner.owner.name,
            format!(
                "association '{}' has cardinality {:?}",
                self.name(),
                self.cardinality()
            ),
        )
    }

    async fn load(&self) -> Result<Resolved> {
        let inner = &self.inner;
        let factory = &inner.factory;
        let definition = &inner.definition;

        match inner.source {
            Source::Absent => Ok(Resolved::One(None)),
            Source::Built(ref resource) => Ok(Resolved::One(resource.clone())),
            Source::BuiltMany(ref resources) => Ok(Resolved::Many(resources.clone())),
            Source::Inline(ref payload) => {
                let target = factory.registry().resolve(&definition.target)?;
                match (definition.cardinality, payload) {
                    (Cardinality::Many, Value::Array(items)) => {
                        Ok(Resolved::Many(factory.build_all(&target, items.clone())?))
                    }
                    (_, payload) => Ok(Resolved::One(Some(
                        factory.build_embedded(target, payload.clone())?,
                    ))),
                }
            }
            Source::Reference(ref reference) => {
                let target = factory.registry().resolve(&definition.target)?;
                let key = reference_key(reference, &target.key_attribute).ok_or_else(|| {
                    Error::validation(
                        &inner.owner.name,
                        format!("reference '{}' carries no key", definition.name),
                    )
                })?;
                let path = target.item_path(&key)?;
                let body = factory.client().fetch(&path).await?;
                let resource = factory.build_typed(target, Some(&key), body)?;
                Ok(Resolved::One(Some(resource)))
            }
            Source::Collection => {
                let target = factory.registry().resolve(&definition.target)?;
                let path = self.collection_path(&target)?;
                let body = factory.client().fetch(&path).await?;
                let items = extract_items(body, &definition.response_path, &path)?;
                Ok(Resolved::Many(factory.build_all(&target, items)?))
            }
        }
    }

    fn collection_path(&self, target: &ResourceType) -> Result<String> {
        let inner = &self.inner;
        let definition = &inner.definition;
        let needs_owner = definition.scoped || definition.filter_param.is_some();

        let owner_key = match inner.owner_key.as_deref() {
            Some(key) => key,
            None if needs_owner => {
                return Err(Error::validation(
                    &inner.owner.name,
                    format!("'{}' needs the owner's key", definition.name),
                ))
            }
            None => "",
        };

        let path = if definition.scoped {
            let owner_path = inner.owner.item_path(owner_key)?;
            target.collection_path(Some(&owner_path))
        } else {
            target.collection_path(None)
        };

        Ok(match definition.filter_param {
            Some(ref param) => with_query(&path, &[(param.as_str(), owner_key)]),
            None => path,
        })
    }
}

impl std::fmt::Debug for LazyAssociation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyAssociation")
            .field("name", &self.name())
            .field("target", &self.inner.definition.target)
            .field("state", &self.state())
            .finish()
    }
}

fn initial_slot(source: &Source) -> Slot {
    match source {
        Source::Absent => Slot::Resolved(Resolved::One(None)),
        Source::Built(resource) => Slot::Resolved(Resolved::One(resource.clone())),
        Source::BuiltMany(resources) => Slot::Resolved(Resolved::Many(resources.clone())),
        Source::Reference(_) | Source::Inline(_) | Source::Collection => Slot::Unresolved,
    }
}

/// Key carried by a reference: a scalar, or the key field of a small object
pub(crate) fn reference_key(reference: &Value, key_attribute: &str) -> Option<String> {
    use super::attributes::scalar_to_string;

    let key = match reference {
        Value::Object(obj) => [key_attribute, "key", "id"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(scalar_to_string)),
        other => scalar_to_string(other),
    };
    key.filter(|k| !k.is_empty())
}

/// Extract the item array from a collection response
pub(crate) fn extract_items(body: Value, response_path: &str, path: &str) -> Result<Vec<Value>> {
    let malformed = |message: String| Error::Malformed {
        path: path.to_string(),
        message,
    };

    let mut current = body;
    if !response_path.is_empty() && !current.is_array() {
        for part in response_path.split('.') {
            current = match current {
                Value::Object(mut map) => map
                    .remove(part)
                    .ok_or_else(|| malformed(format!("missing '{}'", response_path)))?,
                _ => return Err(malformed(format!("expected an object at '{}'", part))),
            };
        }
    }

    match current {
        Value::Array(items) => Ok(items),
        _ => Err(malformed("expected a JSON array".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_items_from_array_body() {
        let items = extract_items(json!([{"id": "1"}, {"id": "2"}]), "", "status").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_extract_items_at_response_path() {
        let body = json!({"startAt": 0, "comments": [{"id": "1"}]});
        let items = extract_items(body, "comments", "issue/P-1/comment").unwrap();
        assert_eq!(items, vec![json!({"id": "1"})]);
    }

    #[test]
    fn test_extract_items_rejects_wrong_shape() {
        let err = extract_items(json!({"total": 0}), "comments", "x").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));

        let err = extract_items(json!({"values": []}), "", "x").unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }

    #[test]
    fn test_reference_key() {
        assert_eq!(reference_key(&json!("PROJ-1"), "key").as_deref(), Some("PROJ-1"));
        assert_eq!(reference_key(&json!(42), "id").as_deref(), Some("42"));
        assert_eq!(
            reference_key(&json!({"id": "10", "self": "http://x"}), "key").as_deref(),
            Some("10")
        );
        assert_eq!(
            reference_key(&json!({"id": "10", "key": "P-9"}), "key").as_deref(),
            Some("P-9")
        );
        assert_eq!(reference_key(&json!({"self": "http://x"}), "id"), None);
        assert_eq!(reference_key(&json!(""), "id"), None);
    }
}
