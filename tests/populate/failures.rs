//! Unregistered entities and failing lookups abort the whole resolution.

use std::time::Duration;

use serde_json::json;
use sifted_rust::{EntityRegistry, LookupError, PopulateError, PopulateNode};

use crate::support::{resolver, users, DownLookup, RecordingLookup};

#[tokio::test]
async fn unregistered_entity_fails_before_any_lookup() {
    let users = RecordingLookup::new(users(), Duration::ZERO);
    let resolver = resolver(EntityRegistry::new().register("user", users.clone()));

    let err = resolver
        .resolve(
            vec![json!({ "author": "u1", "comments": ["k1"] })],
            vec![
                PopulateNode::new("author").with_entity("user"),
                PopulateNode::new("comments").with_entity("comment"),
            ],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PopulateError::EntityNotRegistered(ref name) if name == "comment"));
    assert_eq!(err.to_string(), "entity not registered: comment");
    assert_eq!(users.lookups(), 0);
}

#[tokio::test]
async fn unregistered_nested_entity_fails_the_resolution() {
    let resolver = resolver(EntityRegistry::new().register("user", users()));

    let err = resolver
        .resolve(
            vec![json!({ "author": "u1" })],
            vec![PopulateNode::new("author")
                .with_entity("user")
                .with_populate([PopulateNode::new("company")])],
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PopulateError::EntityNotRegistered(ref name) if name == "company"));
}

#[tokio::test]
async fn failed_lookup_is_reported_with_its_entity() {
    let resolver = resolver(
        EntityRegistry::new()
            .register("user", users())
            .register("company", DownLookup),
    );

    let err = resolver
        .resolve(
            vec![json!({ "author": "u1", "company": "c1" })],
            vec![
                PopulateNode::new("author").with_entity("user"),
                PopulateNode::new("company"),
            ],
        )
        .await
        .unwrap_err();

    match &err {
        PopulateError::Lookup { entity, source } => {
            assert_eq!(entity, "company");
            assert!(matches!(source, LookupError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.status_code(), 503);
    assert_eq!(err.code(), "lookup_failed");
}

#[tokio::test]
async fn missing_documents_are_not_errors() {
    let resolver = resolver(EntityRegistry::new().register("user", users()));

    let resolved = resolver
        .resolve(
            vec![json!({ "author": "ghost" }), json!({ "author": "u1" })],
            vec![PopulateNode::new("author").with_entity("user")],
        )
        .await
        .unwrap();

    assert_eq!(resolved[0]["author"], "ghost");
    assert_eq!(resolved[1]["author"]["name"], "Ann");
}
