//! HTTP adapter integration tests.


#[cfg(feature = "http")]
mod routes;
