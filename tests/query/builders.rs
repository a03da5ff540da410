//! The same request translated for both stores.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sifted_rust::store::{document, search};
use sifted_rust::QueryDescriptor;

use crate::support::{catalogue_request, config};

#[test]
fn document_store_query() {
    let built = document::build(&catalogue_request());

    assert_eq!(
        Value::Object(built.filter),
        json!({
            "category": "lamps",
            "status": { "$nin": ["draft", "archived"] },
            "title": { "$regex": "desk", "$options": "i" },
            "price": { "$gte": 10, "$lte": 200 },
            "_id": { "$in": ["p1", "p2", "p3"] }
        })
    );
    assert_eq!(
        serde_json::to_value(&built.options).unwrap(),
        json!({
            "projection": { "price": 1, "title": 1, "vendor": 1 },
            "sort": { "price": -1, "name.de": 1 },
            "skip": 2,
            "limit": 2,
            "collation": { "locale": "de" }
        })
    );
}

#[test]
fn search_engine_query() {
    let request = search::build(&catalogue_request());
    let body = Value::Object(request.body);

    assert_eq!(
        body["query"],
        json!({
            "bool": {
                "filter": [
                    { "term": { "category": "lamps" } },
                    { "regexp": { "title": { "value": ".*desk.*", "case_insensitive": true } } },
                    { "range": { "price": { "gte": 10 } } },
                    { "range": { "price": { "lte": 200 } } },
                    { "ids": { "values": ["p1", "p2", "p3"] } }
                ],
                "must_not": [
                    { "terms": { "status": ["draft", "archived"] } }
                ]
            }
        })
    );
    assert_eq!(body["from"], json!(2));
    assert_eq!(body["size"], json!(2));
    assert_eq!(body["track_total_hits"], json!(true));
    assert_eq!(body["_source"], json!({ "includes": ["price", "title", "vendor"] }));
    assert_eq!(
        body["sort"],
        json!([{ "price": { "order": "desc" } }, { "name.de": { "order": "asc" } }])
    );
}

#[test]
fn regex_injection_is_escaped_for_both_stores() {
    let query = QueryDescriptor::from_request(config(), vec![("%name", "a.*(b")]);

    let filter = Value::Object(document::build(&query).filter);
    assert_eq!(filter["name"]["$regex"], json!("^a\\.\\*\\(b"));

    let body = Value::Object(search::build(&query).body);
    assert_eq!(
        body["query"]["bool"]["filter"][0]["regexp"]["name"]["value"],
        json!("a\\.\\*\\(b.*")
    );
}

#[test]
fn nested_group_survives_both_translations() {
    let query = QueryDescriptor::from_request(
        config(),
        vec![(
            ")or",
            r#"[{"))variants":{"color":"red"}},{"?clearance":"true"}]"#,
        )],
    );

    let filter = Value::Object(document::build(&query).filter);
    assert_eq!(
        filter,
        json!({
            "$or": [
                { "variants": { "$elemMatch": { "color": "red" } } },
                { "clearance": { "$exists": true } }
            ]
        })
    );

    let body = Value::Object(search::build(&query).body);
    let top = body["query"]["bool"]["filter"].as_array().unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(
        top[0]["bool"]["should"][0],
        json!({ "bool": { "filter": [{
            "nested": {
                "path": "variants",
                "query": { "bool": { "filter": [{ "term": { "variants.color": "red" } }] } }
            }
        }] } })
    );
}

#[test]
fn unknown_keys_are_noise() {
    let query = QueryDescriptor::from_request(config(), vec![("-x", "1"), ("#tag", "2"), ("!!", "a")]);
    assert!(query.filters().is_empty());
    assert_eq!(document::build(&query).filter.len(), 0);
    assert_eq!(search::build(&query).body["query"], json!({ "match_all": {} }));
}
