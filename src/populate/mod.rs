//! Populate - Cross-entity reference resolution.
//!
//! Entities live in independently owned services: there are no foreign keys
//! and no joins. A populate tree names the reference fields to resolve; the
//! [`PopulationResolver`] batches the referenced ids per entity type, looks
//! them up through the [`EntityRegistry`], and splices the results back into
//! the documents.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use serde_json::json;
//! use sifted_rust::{EntityRegistry, InMemoryLookup, PopulateNode, PopulationResolver};
//!
//! let users = InMemoryLookup::with_docs([json!({ "_id": "u1", "name": "Ann" })]);
//! let resolver = PopulationResolver::new(Arc::new(EntityRegistry::new().register("user", users)));
//!
//! let docs = resolver
//!     .resolve(
//!         vec![json!({ "title": "Hello", "author": "u1" })],
//!         vec![PopulateNode::new("author").with_entity("user").with_select("name")],
//!     )
//!     .await?;
//! assert_eq!(docs[0]["author"]["name"], "Ann");
//! ```

mod in_memory;
mod merge;
mod node;
mod path;
mod registry;
mod resolver;

pub use in_memory::InMemoryLookup;
pub use merge::merge;
pub use node::{PopulateNode, DEFAULT_PROP, EACH_MARKER};
pub use registry::{Document, EntityRegistry, LookupHandler};
pub use resolver::PopulationResolver;
