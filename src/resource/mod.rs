//! Resource abstraction layer
//!
//! This module turns decoded JSON into navigable resources. Resource types
//! are data: a descriptor per type lists its endpoint, key attribute and
//! associations, and one factory interprets every descriptor the same way.
//!
//! # Architecture
//!
//! - [`registry`] - Resource types and association declarations, including
//!   the bundled JIRA catalogue loaded from embedded JSON
//! - [`identity`] - Endpoint names, collection and item paths
//! - [`attributes`] - The raw attribute bag of one resource
//! - [`factory`] - Builds resources and wires their associations
//! - [`lazy`] - Deferred, cached association resolution
//! - [`base`] - The caller-facing [`Resource`] with its lifecycle calls
//!
//! # Example
//!
//! ```ignore
//! use jira_resource::resource::{Resource, ResourceFactory};
//!
//! async fn link_ends(factory: &ResourceFactory) -> jira_resource::Result<()> {
//!     let link = Resource::find(factory, "Issuelink", "10001").await?;
//!     let inward = link.one("inwardIssue").await?;
//!     let link_type = link.one("type").await?;
//!     println!("{:?} {:?}", inward, link_type);
//!     Ok(())
//! }
//! ```

pub mod attributes;
mod base;
mod collaborator;
mod factory;
pub mod identity;
mod lazy;
pub mod registry;

pub use attributes::AttributeStore;
pub use base::Resource;
pub use collaborator::{Collaborator, WriteMethod};
pub use factory::ResourceFactory;
pub use lazy::{AssociationState, LazyAssociation, Resolved};
pub use registry::{
    builtin_registry, AssociationDef, Cardinality, ResourceType, TypeRef, TypeRegistry,
};
