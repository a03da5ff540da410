//! PopulationResolver - Batched cross-entity population.
//!
//! Resolution of one populate level is a two-pass batch transform:
//!
//! 1. Collect the distinct reference values of every node, grouped by
//!    (entity type, lookup property, node filters), and issue one lookup per
//!    group. Lookups of different groups run concurrently and are all awaited.
//! 2. Replace the references in every document with the resolved documents.
//!
//! Each group descends into its own nested populate nodes before its results
//! are indexed, so depth is bounded by the tree the caller built.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sifted_rust::{EntityRegistry, PopulateNode, PopulationResolver};
//!
//! let registry = EntityRegistry::new()
//!     .register("user", users_client)
//!     .register("company", companies_client);
//! let resolver = PopulationResolver::new(Arc::new(registry));
//!
//! let posts = resolver
//!     .resolve(posts, vec![PopulateNode::new("author").with_entity("user")])
//!     .await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use crate::config::QueryConfig;
use crate::error::PopulateError;
use crate::filter::Operator;
use crate::query::projection::normalize_select;
use crate::query::QueryDescriptor;

use super::merge::merge;
use super::path::{get_path, key_of, reference_values, splice};
use super::registry::{Document, EntityRegistry, LookupHandler};
use super::PopulateNode;

/// (entity type, lookup property, canonical node filters)
type BatchKey = (String, String, String);

/// One batched lookup: every reference value of every node resolving through
/// the same entity type and lookup property with the same filters.
struct Batch {
    entity: String,
    prop: String,
    filters: String,
    handler: Arc<dyn LookupHandler>,
    ids: Vec<Value>,
    seen: HashSet<String>,
    nodes: Vec<PopulateNode>,
}

impl Batch {
    fn key(&self) -> BatchKey {
        (self.entity.clone(), self.prop.clone(), self.filters.clone())
    }
}

fn batch_key(node: &PopulateNode) -> BatchKey {
    (
        node.entity_name().to_string(),
        node.lookup_prop().to_string(),
        filters_key(node),
    )
}

/// Node filters in key order, so equal filter sets share a batch.
fn filters_key(node: &PopulateNode) -> String {
    let Some(filters) = node.filters.as_ref().filter(|f| !f.is_empty()) else {
        return String::new();
    };
    let mut entries: Vec<(&String, &Value)> = filters.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect()).to_string()
}

#[derive(Debug, Clone)]
pub struct PopulationResolver {
    registry: Arc<EntityRegistry>,
    config: Arc<QueryConfig>,
}

impl PopulationResolver {
    pub fn new(registry: Arc<EntityRegistry>) -> Self {
        Self {
            registry,
            config: Arc::new(QueryConfig::default()),
        }
    }

    /// Use `config` for the descriptors built for batched lookups.
    pub fn with_config(mut self, config: Arc<QueryConfig>) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Populate `docs` with the populate tree of `query`.
    pub async fn resolve_query(
        &self,
        docs: Vec<Document>,
        query: &QueryDescriptor,
    ) -> Result<Vec<Document>, PopulateError> {
        self.resolve(docs, query.populate_nodes().to_vec()).await
    }

    /// Populate `docs` following `tree`.
    ///
    /// Fails with [`PopulateError::EntityNotRegistered`] before any lookup is
    /// issued when a node names an unknown entity type, and with
    /// [`PopulateError::Lookup`] when any batched lookup fails.
    pub fn resolve(
        &self,
        docs: Vec<Document>,
        tree: Vec<PopulateNode>,
    ) -> BoxFuture<'_, Result<Vec<Document>, PopulateError>> {
        async move {
            let nodes: Vec<PopulateNode> = merge(tree)
                .into_iter()
                .filter(|node| !node.is_marked_for_skip())
                .collect();
            if docs.is_empty() || nodes.is_empty() {
                return Ok(docs);
            }

            let batches = self.plan(&docs, &nodes)?;
            let resolved: HashMap<BatchKey, HashMap<String, Document>> =
                try_join_all(batches.into_iter().map(|batch| self.run(batch)))
                    .await?
                    .into_iter()
                    .collect();

            let mut docs = docs;
            for doc in &mut docs {
                for node in &nodes {
                    if let Some(index) = resolved.get(&batch_key(node)) {
                        splice(doc, node.source_path(), &node.path, index);
                    }
                }
            }
            Ok(docs)
        }
        .boxed()
    }

    /// Group reference values into batches. Every node's entity type must be
    /// registered, even when no document references it.
    fn plan(&self, docs: &[Document], nodes: &[PopulateNode]) -> Result<Vec<Batch>, PopulateError> {
        let mut batches: Vec<Batch> = Vec::new();

        for node in nodes {
            let entity = node.entity_name();
            let handler = self
                .registry
                .get(entity)
                .ok_or_else(|| PopulateError::EntityNotRegistered(entity.to_string()))?;

            let key = batch_key(node);
            let position = match batches.iter().position(|b| b.key() == key) {
                Some(position) => position,
                None => {
                    let (entity, prop, filters) = key;
                    batches.push(Batch {
                        entity,
                        prop,
                        filters,
                        handler: Arc::clone(handler),
                        ids: Vec::new(),
                        seen: HashSet::new(),
                        nodes: Vec::new(),
                    });
                    batches.len() - 1
                }
            };

            let batch = &mut batches[position];
            batch.nodes.push(node.clone());
            for doc in docs {
                for value in reference_values(doc, node.source_path()) {
                    if let Some(key) = key_of(&value) {
                        if batch.seen.insert(key) {
                            batch.ids.push(value);
                        }
                    }
                }
            }
        }

        batches.retain(|batch| !batch.ids.is_empty());
        Ok(batches)
    }

    /// Run one batched lookup, populate its results one level deeper, and
    /// index them by lookup property.
    async fn run(
        &self,
        batch: Batch,
    ) -> Result<(BatchKey, HashMap<String, Document>), PopulateError> {
        let query = self.batch_query(&batch);
        debug!(
            entity = %batch.entity,
            prop = %batch.prop,
            ids = batch.ids.len(),
            "populating batch"
        );

        let docs = batch
            .handler
            .find(query)
            .await
            .map_err(|source| PopulateError::Lookup {
                entity: batch.entity.clone(),
                source,
            })?;

        let nested: Vec<PopulateNode> = batch
            .nodes
            .iter()
            .flat_map(|node| node.populate.iter().cloned())
            .collect();
        let docs = if nested.is_empty() {
            docs
        } else {
            self.resolve(docs, nested).await?
        };

        let mut index = HashMap::with_capacity(docs.len());
        for doc in docs {
            if let Some(key) = get_path(&doc, &batch.prop).and_then(key_of) {
                index.entry(key).or_insert(doc);
            }
        }
        Ok((batch.key(), index))
    }

    fn batch_query(&self, batch: &Batch) -> QueryDescriptor {
        let mut query = QueryDescriptor::with_config(Arc::clone(&self.config))
            .set_paging(1, -1)
            .filter_op(&batch.prop, Operator::In, Value::Array(batch.ids.clone()));

        // Nodes of one batch share their filters.
        if let Some(filters) = batch.nodes.first().and_then(|n| n.filters.as_ref()) {
            query = query.set_filters(filters.iter().map(|(k, v)| (k.as_str(), v.clone())));
        }

        if let Some(locale) = batch.nodes.iter().find_map(|n| n.locale.as_deref()) {
            query = query.set_locale(locale);
        }

        if let Some(select) = batch_select(batch) {
            query = query.select(&select);
        }

        let nested: Vec<PopulateNode> = batch
            .nodes
            .iter()
            .flat_map(|node| node.populate.iter().cloned())
            .collect();
        if !nested.is_empty() {
            query = query.populate(nested);
        }

        query
    }
}

/// Union of the nodes' select fields plus the lookup property. `None` when
/// any node wants whole documents.
fn batch_select(batch: &Batch) -> Option<String> {
    let mut selects = Vec::with_capacity(batch.nodes.len());
    for node in &batch.nodes {
        selects.push(node.select.as_deref()?);
    }

    let joined = selects.join(" ");
    let includes_any = joined
        .split_whitespace()
        .any(|token| !token.starts_with('-'));
    let select = if includes_any {
        normalize_select(&format!("{joined} {}", batch.prop))
    } else {
        normalize_select(&joined)
    };
    (!select.is_empty()).then_some(select)
}
