//! EntityRegistry - Maps entity type names to the handlers that look them up.
//!
//! Assembled once at startup and shared immutably (behind an `Arc`) by every
//! resolver. Handlers usually wrap a client of the service owning the entity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LookupError;
use crate::query::QueryDescriptor;

/// A JSON document as returned by lookup handlers.
pub type Document = Value;

/// Batched lookup of one entity type.
///
/// Handlers return documents as stored: population of the returned documents
/// is done by the resolver, so the descriptor's populate tree is informative
/// only (its relation paths are already part of the projection).
#[async_trait]
pub trait LookupHandler: Send + Sync {
    async fn find(&self, query: QueryDescriptor) -> Result<Vec<Document>, LookupError>;

    /// Number of documents matching the filters of `query`, ignoring paging.
    ///
    /// The default runs an unbounded `find`; stores with a native count
    /// should override it.
    async fn count(&self, query: QueryDescriptor) -> Result<u64, LookupError> {
        let docs = self.find(query.set_paging(1, -1)).await?;
        Ok(u64::try_from(docs.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl<H: LookupHandler + ?Sized> LookupHandler for Arc<H> {
    async fn find(&self, query: QueryDescriptor) -> Result<Vec<Document>, LookupError> {
        (**self).find(query).await
    }

    async fn count(&self, query: QueryDescriptor) -> Result<u64, LookupError> {
        (**self).count(query).await
    }
}

/// Entity type name → lookup handler.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    handlers: HashMap<String, Arc<dyn LookupHandler>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an entity type. Uses builder pattern.
    pub fn register<H>(mut self, entity: impl Into<String>, handler: H) -> Self
    where
        H: LookupHandler + 'static,
    {
        self.handlers.insert(entity.into(), Arc::new(handler));
        self
    }

    /// Register an already shared handler.
    pub fn register_shared(
        mut self,
        entity: impl Into<String>,
        handler: Arc<dyn LookupHandler>,
    ) -> Self {
        self.handlers.insert(entity.into(), handler);
        self
    }

    pub fn get(&self, entity: &str) -> Option<&Arc<dyn LookupHandler>> {
        self.handlers.get(entity)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.handlers.contains_key(entity)
    }

    /// Registered entity names, sorted.
    pub fn entities(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("entities", &self.entities())
            .finish()
    }
}
