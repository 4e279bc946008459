//! Typed client, schema validation and query cache for the examples REST
//! resource.

pub mod cache;
pub mod config;
pub mod error;
pub mod example;
pub mod http;
pub mod mutation;
pub mod navigation;
pub mod query;
pub mod storage;

pub use error::{ApiError, ValidationError};
