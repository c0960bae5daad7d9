//! JIRA API interaction module
//!
//! The concrete transport behind the resource engine.
//!
//! # Module Structure
//!
//! - [`auth`] - Credentials (basic, bearer, anonymous)
//! - [`client`] - Main JIRA client, implements `Collaborator`
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use jira_resource::jira::client::JiraClient;
//! use jira_resource::resource::{Resource, ResourceFactory};
//! use std::sync::Arc;
//!
//! async fn example(config: &jira_resource::config::Config) -> jira_resource::Result<()> {
//!     let client = JiraClient::from_config(config)?;
//!     let factory = ResourceFactory::with_builtin_types(Arc::new(client));
//!     let issue = Resource::find(&factory, "Issue", "PROJ-1").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
