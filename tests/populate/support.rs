//! Test lookup handlers: a recording wrapper and a failing handler.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;
use sifted_rust::{
    async_trait, Document, EntityRegistry, InMemoryLookup, LookupError, LookupHandler,
    PopulationResolver, QueryDescriptor,
};

/// Wraps an `InMemoryLookup`, records when each lookup started and which
/// descriptor it received, and holds every lookup open for `delay`.
#[derive(Clone)]
pub struct RecordingLookup {
    inner: InMemoryLookup,
    delay: Duration,
    starts: Arc<Mutex<Vec<Instant>>>,
    queries: Arc<Mutex<Vec<QueryDescriptor>>>,
}

impl RecordingLookup {
    pub fn new(inner: InMemoryLookup, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            starts: Arc::default(),
            queries: Arc::default(),
        }
    }

    pub fn starts(&self) -> Vec<Instant> {
        self.starts.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<QueryDescriptor> {
        self.queries.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> usize {
        self.starts.lock().unwrap().len()
    }
}

#[async_trait]
impl LookupHandler for RecordingLookup {
    async fn find(&self, query: QueryDescriptor) -> Result<Vec<Document>, LookupError> {
        self.starts.lock().unwrap().push(Instant::now());
        self.queries.lock().unwrap().push(query.clone());
        tokio::time::sleep(self.delay).await;
        self.inner.find(query).await
    }
}

/// Always fails with `Unavailable`.
pub struct DownLookup;

#[async_trait]
impl LookupHandler for DownLookup {
    async fn find(&self, _query: QueryDescriptor) -> Result<Vec<Document>, LookupError> {
        Err(LookupError::Unavailable("connection refused".into()))
    }
}

pub fn users() -> InMemoryLookup {
    InMemoryLookup::with_docs([
        json!({ "_id": "u1", "name": "Ann", "email": "ann@example.com", "company": "c1", "manager": "u2" }),
        json!({ "_id": "u2", "name": "Bob", "email": "bob@example.com", "company": "c2", "manager": "u3" }),
        json!({ "_id": "u3", "name": "Cid", "email": "cid@example.com", "company": "c1" }),
    ])
}

pub fn companies() -> InMemoryLookup {
    InMemoryLookup::with_docs([
        json!({ "_id": "c1", "name": "Acme", "country": "NL" }),
        json!({ "_id": "c2", "name": "Globex", "country": "US" }),
    ])
}

pub fn products() -> InMemoryLookup {
    InMemoryLookup::with_docs([
        json!({ "_id": "p1", "sku": "SKU-1", "title": "Lamp", "vendor": "c1" }),
        json!({ "_id": "p2", "sku": "SKU-2", "title": "Desk", "vendor": "c2" }),
    ])
}

pub fn resolver(registry: EntityRegistry) -> PopulationResolver {
    PopulationResolver::new(Arc::new(registry))
}
