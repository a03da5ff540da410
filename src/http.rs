//! HTTP transport: query-string decoding and read routes over the registry.
//!
//! Requires the `http` feature. Uses axum for routing.
//!
//! ## Routes
//!
//! - `GET /health`: returns `{ "ok": true, "entities": [...] }`.
//! - `GET /:entity`: query string → `QueryDescriptor`, find and count through
//!   the entity's lookup handler, populate, respond with a paginated page.
//! - `GET /:entity/:id`: one document by `_id`, populated.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sifted_rust::{http, EntityRegistry, QueryConfig};
//!
//! let registry = EntityRegistry::new().register("post", posts).register("user", users);
//! let state = http::ApiState::new(Arc::new(QueryConfig::from_env()?), Arc::new(registry));
//!
//! // Compose with other axum routes
//! let app = http::router(state.clone());
//!
//! // Or serve directly
//! http::serve(state, "0.0.0.0:3000").await?;
//! ```

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{FromRef, FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{json, Value};

use crate::config::QueryConfig;
use crate::error::PopulateError;
use crate::filter::Operator;
use crate::pagination::Paginated;
use crate::populate::{Document, EntityRegistry, LookupHandler, PopulationResolver};
use crate::query::QueryDescriptor;
use crate::response::{ApiError, ApiResponse};

/// Shared state of the HTTP routes.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub config: Arc<QueryConfig>,
    pub resolver: PopulationResolver,
}

impl ApiState {
    pub fn new(config: Arc<QueryConfig>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            resolver: PopulationResolver::new(registry).with_config(Arc::clone(&config)),
            config,
        }
    }
}

impl FromRef<ApiState> for Arc<QueryConfig> {
    fn from_ref(state: &ApiState) -> Self {
        Arc::clone(&state.config)
    }
}

/// Extractor decoding the request query string into a [`QueryDescriptor`].
#[derive(Debug, Clone)]
pub struct QueryParams(pub QueryDescriptor);

#[axum::async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    Arc<QueryConfig>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = QueryRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)?;
        let config = Arc::<QueryConfig>::from_ref(state);
        Ok(QueryParams(QueryDescriptor::from_request(config, pairs)))
    }
}

/// Build an axum `Router` serving the registry's entities.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/:entity", get(find_handler))
        .route("/:entity/:id", get(find_one_handler))
        .with_state(state)
}

/// Serve the routes over HTTP at the given address (e.g. `"0.0.0.0:3000"`).
pub async fn serve(state: ApiState, addr: &str) -> Result<(), std::io::Error> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

/// `GET /health`: returns `{ "ok": true, "entities": [...] }`.
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let entities = state.resolver.registry().entities();
    Json(json!({ "ok": true, "entities": entities }))
}

/// `GET /:entity`: one page of documents, populated.
async fn find_handler(
    State(state): State<ApiState>,
    Path(entity): Path<String>,
    QueryParams(query): QueryParams,
) -> Response {
    if !state.resolver.registry().contains(&entity) {
        return unknown_entity(&entity);
    }
    match futures::try_join!(find(&state, &entity, &query), count(&state, &entity, &query)) {
        Ok((docs, total)) => {
            let page = Paginated::from_query(&query).with_total(total).with_docs(docs);
            respond(ApiResponse::ok(page))
        }
        Err(e) => respond(ApiResponse::<()>::from(e)),
    }
}

/// `GET /:entity/:id`: one document, populated.
async fn find_one_handler(
    State(state): State<ApiState>,
    Path((entity, id)): Path<(String, String)>,
    QueryParams(query): QueryParams,
) -> Response {
    if !state.resolver.registry().contains(&entity) {
        return unknown_entity(&entity);
    }
    let query = query
        .set_id(id.clone())
        .filter_op("_id", Operator::Eq, Value::String(id.clone()))
        .set_paging(1, 1);

    match find(&state, &entity, &query).await {
        Ok(docs) => match docs.into_iter().next() {
            Some(doc) => respond(ApiResponse::ok(doc)),
            None => respond(ApiResponse::<()>::failure(
                404,
                vec![ApiError::new("not_found", format!("{entity} {id} not found"))],
            )),
        },
        Err(e) => respond(ApiResponse::<()>::from(e)),
    }
}

fn handler<'a>(state: &'a ApiState, entity: &str) -> Result<&'a Arc<dyn LookupHandler>, PopulateError> {
    state
        .resolver
        .registry()
        .get(entity)
        .ok_or_else(|| PopulateError::EntityNotRegistered(entity.to_string()))
}

async fn find(
    state: &ApiState,
    entity: &str,
    query: &QueryDescriptor,
) -> Result<Vec<Document>, PopulateError> {
    let docs = handler(state, entity)?
        .find(query.clone())
        .await
        .map_err(|source| PopulateError::Lookup {
            entity: entity.to_string(),
            source,
        })?;

    state.resolver.resolve_query(docs, query).await
}

async fn count(state: &ApiState, entity: &str, query: &QueryDescriptor) -> Result<u64, PopulateError> {
    handler(state, entity)?
        .count(query.clone())
        .await
        .map_err(|source| PopulateError::Lookup {
            entity: entity.to_string(),
            source,
        })
}

fn unknown_entity(entity: &str) -> Response {
    respond(ApiResponse::<()>::failure(
        404,
        vec![ApiError::new("unknown_entity", format!("no entity named {entity}"))],
    ))
}

fn respond<T: Serialize>(response: ApiResponse<T>) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response)).into_response()
}
