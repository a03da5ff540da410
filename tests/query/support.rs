//! Shared request fixtures.

use std::sync::Arc;

use serde_json::{json, Value};
use sifted_rust::{QueryConfig, QueryDescriptor};

pub fn config() -> Arc<QueryConfig> {
    Arc::new(
        QueryConfig::default()
            .with_multilingual_fields(["name"])
            .with_default_page_size(20),
    )
}

/// A catalogue listing request as it arrives from a query string.
pub fn catalogue_request() -> QueryDescriptor {
    QueryDescriptor::from_request(
        config(),
        vec![
            ("category", "lamps"),
            ("!!status", "draft|archived"),
            ("%%%title", "desk"),
            (">=price", "10"),
            ("<=price", "200"),
            ("@_id", "p1|p2|p3"),
            ("sort", "-price,name"),
            ("page", "2"),
            ("limit", "2"),
            ("select", "title price vendor"),
            ("populate", "vendor"),
            ("locale", "de"),
        ],
    )
}

pub fn products() -> Vec<Value> {
    vec![
        product("p1", "lamps", "live", "Desk lamp", 40, "c1"),
        product("p2", "lamps", "live", "Big desk spot", 120, "c2"),
        product("p3", "lamps", "draft", "Desk", 80, "c1"),
        product("p4", "tables", "live", "Desk", 300, "c2"),
    ]
}

fn product(id: &str, category: &str, status: &str, title: &str, price: u32, vendor: &str) -> Value {
    json!({
        "_id": id,
        "category": category,
        "status": status,
        "title": title,
        "name": { "en": title, "de": title.to_uppercase() },
        "price": price,
        "vendor": vendor
    })
}

pub fn vendors() -> Vec<Value> {
    vec![
        json!({ "_id": "c1", "name": "Acme" }),
        json!({ "_id": "c2", "name": "Globex" }),
    ]
}
