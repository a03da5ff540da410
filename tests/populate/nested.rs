//! Deep populate trees, array indirection and descriptor-driven population.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use sifted_rust::{EntityRegistry, PopulateNode, QueryDescriptor};

use crate::support::{companies, products, resolver, users, RecordingLookup};

#[tokio::test]
async fn descends_one_level_per_nested_populate() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let companies = RecordingLookup::new(companies(), Duration::ZERO);
    let resolver = resolver(
        EntityRegistry::new()
            .register("user", users.clone())
            .register("company", companies.clone()),
    );

    let docs = vec![json!({ "title": "Hello", "author": "u1" })];
    let tree = vec![PopulateNode::new("author")
        .with_entity("user")
        .with_select("name company")
        .with_populate([PopulateNode::new("company").with_select("name")])];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(
        resolved[0],
        json!({
            "title": "Hello",
            "author": {
                "_id": "u1",
                "name": "Ann",
                "company": { "_id": "c1", "name": "Acme" }
            }
        })
    );
    assert_eq!((users.lookups(), companies.lookups()), (1, 1));
}

#[tokio::test]
async fn self_referencing_tree_stops_at_its_own_depth() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let manager = || PopulateNode::new("manager").with_entity("user");
    let tree = vec![manager().with_populate([manager().with_populate([manager()])])];

    let resolved = resolver
        .resolve(vec![json!({ "_id": "x", "manager": "u1" })], tree)
        .await
        .unwrap();

    // u1 -> u2 -> u3, three levels requested and three lookups issued.
    assert_eq!(users.lookups(), 3);
    assert_eq!(resolved[0]["manager"]["name"], "Ann");
    assert_eq!(resolved[0]["manager"]["manager"]["name"], "Bob");
    assert_eq!(resolved[0]["manager"]["manager"]["manager"]["name"], "Cid");
}

#[tokio::test]
async fn depth_is_bounded_by_the_tree_not_the_data() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let tree = vec![PopulateNode::new("manager")
        .with_entity("user")
        .with_populate([PopulateNode::new("manager").with_entity("user")])];

    let resolved = resolver
        .resolve(vec![json!({ "manager": "u1" })], tree)
        .await
        .unwrap();

    assert_eq!(users.lookups(), 2);
    assert_eq!(resolved[0]["manager"]["manager"]["manager"], "u3");
}

#[tokio::test]
async fn array_elements_resolve_in_place() {
    let resolver = resolver(EntityRegistry::new().register("product", products()));

    let docs = vec![json!({
        "lines": [
            { "product": "p1", "qty": 2 },
            { "product": "p9", "qty": 1 },
            { "product": "p2", "qty": 5 }
        ]
    })];
    let tree = vec![PopulateNode::new("lines.$.product")
        .with_entity("product")
        .with_select("title")];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(
        resolved[0]["lines"],
        json!([
            { "product": { "_id": "p1", "title": "Lamp" }, "qty": 2 },
            { "product": "p9", "qty": 1 },
            { "product": { "_id": "p2", "title": "Desk" }, "qty": 5 }
        ])
    );
}

#[tokio::test]
async fn path_prop_reads_from_another_field() {
    let resolver = resolver(EntityRegistry::new().register("user", users()));

    let docs = vec![json!({ "authorId": "u2" })];
    let tree = vec![PopulateNode::new("author")
        .with_entity("user")
        .with_path_prop("authorId")
        .with_select("name")];

    let resolved = resolver.resolve(docs, tree).await.unwrap();

    assert_eq!(
        resolved[0],
        json!({ "authorId": "u2", "author": { "_id": "u2", "name": "Bob" } })
    );
}

#[tokio::test]
async fn marked_nodes_are_skipped() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let docs = vec![json!({ "author": "u1" })];
    let resolved = resolver
        .resolve(docs.clone(), vec![PopulateNode::new("author").with_entity("user").skipped()])
        .await
        .unwrap();

    assert_eq!(resolved, docs);
    assert_eq!(users.lookups(), 0);
}

#[tokio::test]
async fn duplicate_nodes_merge_before_lookup() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let tree = vec![
        PopulateNode::new("author").with_select("name"),
        PopulateNode::new("author").with_entity("user").with_select("email"),
    ];
    let resolved = resolver
        .resolve(vec![json!({ "author": "u3" })], tree)
        .await
        .unwrap();

    assert_eq!(users.lookups(), 1);
    assert_eq!(
        resolved[0]["author"],
        json!({ "_id": "u3", "name": "Cid", "email": "cid@example.com" })
    );
}

#[tokio::test]
async fn resolves_the_tree_of_a_request() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let registry = EntityRegistry::new().register("author", users.clone());
    let resolver = resolver(registry);

    let query = QueryDescriptor::from_request(
        std::sync::Arc::default(),
        vec![
            ("select", "title"),
            ("populate", r#"{"path":"author","select":"name"}"#),
            ("locale", "nl"),
        ],
    );
    assert!(query.projection().contains_key("author"));

    let resolved = resolver
        .resolve_query(vec![json!({ "title": "T", "author": "u1" })], &query)
        .await
        .unwrap();

    assert_eq!(resolved[0]["author"]["name"], "Ann");
    assert_eq!(users.queries()[0].locale(), "nl");
}
