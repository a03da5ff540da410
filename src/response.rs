//! ApiResponse - Outer success/failure wrapper for query results.
//!
//! The query engine returns typed errors; this is the one place they are
//! rendered into a response body with a typed error list.

use serde::Serialize;

use crate::error::{LookupError, PopulateError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ApiError>,
    /// HTTP-style status for transports; not part of the body.
    #[serde(skip)]
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            errors: Vec::new(),
            status: 200,
        }
    }

    pub fn failure(status: u16, errors: Vec<ApiError>) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            status,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

impl<T> From<PopulateError> for ApiResponse<T> {
    fn from(err: PopulateError) -> Self {
        Self::failure(err.status_code(), vec![ApiError::new(err.code(), err.to_string())])
    }
}

impl<T> From<LookupError> for ApiResponse<T> {
    fn from(err: LookupError) -> Self {
        Self::failure(
            err.status_code(),
            vec![ApiError::new("lookup_failed", err.to_string())],
        )
    }
}
