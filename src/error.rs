use std::error::Error;

use thiserror::Error;

/// Failure reported by a host lookup handler.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The backing service or store could not be reached.
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the query.
    #[error("lookup rejected: {0}")]
    Rejected(String),
    /// Other error.
    #[error("lookup error: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}

/// Error type for cross-entity population.
#[derive(Debug, Error)]
pub enum PopulateError {
    /// A populate node names an entity type the registry does not know.
    #[error("entity not registered: {0}")]
    EntityNotRegistered(String),
    /// A batched lookup failed; the whole resolution is aborted.
    #[error("lookup for entity {entity} failed: {source}")]
    Lookup {
        entity: String,
        #[source]
        source: LookupError,
    },
}

/// Error type for loading a `QueryConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for {key}: {value}")]
    Invalid { key: String, value: String },
    #[error("config decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LookupError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            LookupError::Unavailable(_) => 503,
            LookupError::Rejected(_) => 400,
            LookupError::Other(_) => 500,
        }
    }
}

impl PopulateError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            PopulateError::EntityNotRegistered(_) => 500,
            PopulateError::Lookup { source, .. } => source.status_code(),
        }
    }

    /// Stable machine-readable code for response error lists.
    pub fn code(&self) -> &'static str {
        match self {
            PopulateError::EntityNotRegistered(_) => "entity_not_registered",
            PopulateError::Lookup { .. } => "lookup_failed",
        }
    }
}
