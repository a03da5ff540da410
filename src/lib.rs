mod config;
mod error;
pub mod filter;
mod pagination;
pub mod populate;
pub mod query;
mod response;
pub mod store;

#[cfg(feature = "http")]
pub mod http;

pub use config::QueryConfig;
pub use error::{ConfigError, LookupError, PopulateError};
pub use filter::{BoolTag, Filter, FilterSet, FilterValue, Operator, RegexMode};
pub use pagination::Paginated;
pub use populate::{
    merge, Document, EntityRegistry, InMemoryLookup, LookupHandler, PopulateNode,
    PopulationResolver,
};
pub use query::projection::Projection;
pub use query::{QueryDescriptor, Scroll, Slice, SortDirection};
pub use response::{ApiError, ApiResponse};
pub use store::{DocumentQuery, SearchBodyBuilder, SearchRequest};

// Re-export async_trait so lookup handlers can be written without a direct dependency
pub use async_trait::async_trait;
