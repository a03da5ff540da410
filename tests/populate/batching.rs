//! One lookup per (entity, prop, filters) group, issued concurrently.

use std::time::Duration;

use serde_json::{json, Value};
use sifted_rust::{EntityRegistry, Operator, PopulateNode};

use crate::support::{companies, products, resolver, users, RecordingLookup};

const DELAY: Duration = Duration::from_millis(50);

#[tokio::test]
async fn hundred_docs_three_entity_types_three_concurrent_lookups() {
    let users = RecordingLookup::new(users(), DELAY);
    let companies = RecordingLookup::new(companies(), DELAY);
    let products = RecordingLookup::new(products(), DELAY);
    let resolver = resolver(
        EntityRegistry::new()
            .register("user", users.clone())
            .register("company", companies.clone())
            .register("product", products.clone()),
    );

    let docs: Vec<Value> = (0..100)
        .map(|i| match i % 3 {
            0 => json!({ "n": i, "author": if i % 2 == 0 { "u1" } else { "u2" } }),
            1 => json!({ "n": i, "company": "c1" }),
            _ => json!({ "n": i, "product": "p2" }),
        })
        .collect();

    let tree = vec![
        PopulateNode::new("author").with_entity("user"),
        PopulateNode::new("company"),
        PopulateNode::new("product"),
    ];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!((users.lookups(), companies.lookups(), products.lookups()), (1, 1, 1));

    let starts: Vec<_> = [users.starts(), companies.starts(), products.starts()].concat();
    let first = starts.iter().min().unwrap();
    let last = starts.iter().max().unwrap();
    assert!(
        last.duration_since(*first) < DELAY,
        "lookups were issued sequentially"
    );

    assert_eq!(resolved.len(), 100);
    assert_eq!(resolved[0]["author"]["name"], "Ann");
    assert_eq!(resolved[3]["author"]["name"], "Bob");
    assert_eq!(resolved[1]["company"]["name"], "Acme");
    assert_eq!(resolved[2]["product"]["sku"], "SKU-2");
}

#[tokio::test]
async fn batch_query_carries_distinct_ids_and_select() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let docs = vec![
        json!({ "author": "u1", "reviewer": "u2" }),
        json!({ "author": "u1", "reviewer": "u1" }),
    ];
    let tree = vec![
        PopulateNode::new("author").with_entity("user").with_select("name"),
        PopulateNode::new("reviewer").with_entity("user").with_select("email"),
    ];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(users.lookups(), 1);
    let query = &users.queries()[0];
    assert_eq!(query.limit(), None);
    assert_eq!(
        query.filters().get("_id", Operator::In).unwrap().value.as_list(),
        vec![json!("u1"), json!("u2")]
    );
    let selected: Vec<&str> = query.projection().keys().map(String::as_str).collect();
    assert_eq!(selected, vec!["_id", "email", "name"]);

    assert_eq!(resolved[0]["author"], json!({ "_id": "u1", "name": "Ann", "email": "ann@example.com" }));
    assert_eq!(resolved[1]["reviewer"]["_id"], "u1");
}

#[tokio::test]
async fn separate_props_are_separate_batches() {
    let products = RecordingLookup::new(products(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("product", products.clone()));

    let docs = vec![json!({ "main": "p1", "legacy": "SKU-2" })];
    let tree = vec![
        PopulateNode::new("main").with_entity("product"),
        PopulateNode::new("legacy").with_entity("product").with_prop("sku"),
    ];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(products.lookups(), 2);
    assert_eq!(resolved[0]["main"]["title"], "Lamp");
    assert_eq!(resolved[0]["legacy"]["title"], "Desk");
}

#[tokio::test]
async fn node_filters_narrow_the_batch() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let docs = vec![json!({ "members": ["u1", "u2", "u3"] })];
    let tree = vec![PopulateNode::new("members")
        .with_entity("user")
        .with_filter("company", "c1")];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(resolved[0]["members"][0]["name"], "Ann");
    assert_eq!(resolved[0]["members"][1], "u2");
    assert_eq!(resolved[0]["members"][2]["name"], "Cid");
}

#[tokio::test]
async fn filters_stay_with_the_node_that_declared_them() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let docs = vec![json!({ "author": "u1", "reviewer": "u2" })];
    let tree = vec![
        PopulateNode::new("author")
            .with_entity("user")
            .with_filter("company", "c1"),
        PopulateNode::new("reviewer").with_entity("user"),
    ];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(resolved[0]["author"]["name"], "Ann");
    assert_eq!(resolved[0]["reviewer"]["name"], "Bob");
    assert_eq!(users.lookups(), 2);

    let filtered = users
        .queries()
        .into_iter()
        .filter(|q| q.filters().get("company", Operator::Eq).is_some())
        .count();
    assert_eq!(filtered, 1);
}

#[tokio::test]
async fn no_references_means_no_lookup() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let docs = vec![json!({ "title": "orphan" })];
    let resolved = resolver
        .resolve(docs.clone(), vec![PopulateNode::new("author").with_entity("user")])
        .await
        .unwrap();

    assert_eq!(resolved, docs);
    assert_eq!(users.lookups(), 0);
}
