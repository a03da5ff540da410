//! InMemoryLookup - Vec-backed lookup handler for testing and development.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::LookupError;
use crate::filter::matcher;
use crate::query::projection::{is_inclusion, Projection};
use crate::query::{QueryDescriptor, SortDirection};

use super::path::{get_path, remove_path, set_path};
use super::registry::{Document, LookupHandler};

/// In-memory documents of one entity type, queried with the same
/// descriptors the real stores receive.
///
/// Clone-friendly via Arc: clones share documents and the lookup counter.
#[derive(Clone, Default)]
pub struct InMemoryLookup {
    docs: Arc<RwLock<Vec<Document>>>,
    lookups: Arc<AtomicUsize>,
}

impl InMemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_docs(docs: impl IntoIterator<Item = Document>) -> Self {
        Self {
            docs: Arc::new(RwLock::new(docs.into_iter().collect())),
            lookups: Arc::default(),
        }
    }

    pub fn insert(&self, doc: Document) -> Result<(), LookupError> {
        self.docs
            .write()
            .map_err(|_| LookupError::Unavailable("lock poisoned".into()))?
            .push(doc);
        Ok(())
    }

    /// Number of `find` calls served so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(AtomicOrdering::SeqCst)
    }

    /// Number of stored documents matching the filters of `query`.
    pub fn count_matching(&self, query: &QueryDescriptor) -> Result<u64, LookupError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".into()))?;
        let matching = docs
            .iter()
            .filter(|doc| matcher::matches(doc, query.filters()))
            .count();
        Ok(u64::try_from(matching).unwrap_or(u64::MAX))
    }

    /// Evaluate `query` against the stored documents.
    pub fn query(&self, query: &QueryDescriptor) -> Result<Vec<Document>, LookupError> {
        let docs = self
            .docs
            .read()
            .map_err(|_| LookupError::Unavailable("lock poisoned".into()))?;

        let mut found: Vec<Document> = docs
            .iter()
            .filter(|doc| matcher::matches(doc, query.filters()))
            .cloned()
            .collect();

        let sort = query.sort();
        if !sort.is_empty() {
            found.sort_by(|a, b| {
                sort.iter()
                    .map(|(field, direction)| {
                        let ord = compare_field(get_path(a, field), get_path(b, field));
                        match direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let skip = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let take = query
            .limit()
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));

        Ok(found
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|doc| project(doc, query.projection()))
            .collect())
    }
}

#[async_trait]
impl LookupHandler for InMemoryLookup {
    async fn find(&self, query: QueryDescriptor) -> Result<Vec<Document>, LookupError> {
        self.lookups.fetch_add(1, AtomicOrdering::SeqCst);
        self.query(&query)
    }

    async fn count(&self, query: QueryDescriptor) -> Result<u64, LookupError> {
        self.count_matching(&query)
    }
}

/// Apply a projection the way document stores do: inclusion projections keep
/// `_id` unless it is excluded explicitly.
fn project(doc: Document, projection: &Projection) -> Document {
    if projection.is_empty() {
        return doc;
    }

    if is_inclusion(projection) {
        let mut out = Value::Object(Map::new());
        let keep_id = projection.get("_id").copied().unwrap_or(true);
        if keep_id {
            if let Some(id) = doc.get("_id") {
                set_path(&mut out, "_id", id.clone());
            }
        }
        for (path, include) in projection {
            if *include {
                if let Some(value) = get_path(&doc, path) {
                    set_path(&mut out, path, value.clone());
                }
            }
        }
        out
    } else {
        let mut doc = doc;
        for path in projection.keys() {
            remove_path(&mut doc, path);
        }
        doc
    }
}

/// Missing values sort first, then numbers, then strings.
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
