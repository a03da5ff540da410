//! Store query builders.
//!
//! Two independent translators consume a [`QueryDescriptor`]: [`document`]
//! emits a document-store filter with find options, [`search`] emits a
//! search-engine request body. Both are pure functions of the descriptor;
//! drivers consume their output as-is.
//!
//! [`QueryDescriptor`]: crate::QueryDescriptor

pub mod document;
pub mod search;

pub use document::{DocumentQuery, FindOptions};
pub use search::{SearchBodyBuilder, SearchRequest, Window};
