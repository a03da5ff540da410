//! The in-memory handler evaluates descriptors the way the stores would.

use std::sync::Arc;

use serde_json::json;
use sifted_rust::{EntityRegistry, InMemoryLookup, Paginated, PopulationResolver};

use crate::support::{catalogue_request, products, vendors};

#[tokio::test]
async fn find_then_populate_then_paginate() {
    let products = InMemoryLookup::with_docs(products());
    let registry = EntityRegistry::new().register("vendor", InMemoryLookup::with_docs(vendors()));
    let resolver = PopulationResolver::new(Arc::new(registry));

    let query = catalogue_request().set_paging(1, 2);
    let docs = products.query(&query).unwrap();
    let docs = resolver.resolve_query(docs, &query).await.unwrap();

    assert_eq!(
        docs,
        vec![
            json!({ "_id": "p2", "title": "Big desk spot", "price": 120, "vendor": { "_id": "c2", "name": "Globex" } }),
            json!({ "_id": "p1", "title": "Desk lamp", "price": 40, "vendor": { "_id": "c1", "name": "Acme" } }),
        ]
    );

    let page = Paginated::from_query(&query).with_total(2).with_docs(docs);
    assert_eq!((page.pages(), page.has_next_page()), (1, false));
}

#[test]
fn second_page_is_empty() {
    let products = InMemoryLookup::with_docs(products());
    let found = products.query(&catalogue_request()).unwrap();
    assert!(found.is_empty());
}
