//! jira-resource
//!
//! Client-side object model for the JIRA REST API:
//! - Declarative resource types with `one`/`many` associations
//! - Lazy, cached association resolution through a pluggable transport
//! - Resource lifecycle (`find`, `all`, `reload`, `save`, `delete`)
//! - A reqwest-based JIRA client and an in-memory mock for tests

pub mod config;
pub mod error;
pub mod jira;
pub mod mock;
pub mod resource;

pub use config::Config;
pub use error::{Error, Result};
pub use resource::{
    AssociationState, Cardinality, Collaborator, LazyAssociation, Resource, ResourceFactory,
    TypeRegistry, WriteMethod,
};
