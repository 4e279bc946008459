//! The examples resource: payload types, validation, the REST client and
//! its cache-synchronized wrapper.

pub mod cache;
mod cached_client;
mod client;
pub mod schema;
pub mod types;

pub use cached_client::{CachedExampleClient, CreateSnapshot, UpdateSnapshot};
pub use client::{ExampleClient, RESOURCE};
pub use schema::Validate;
pub use types::{
  now_timestamp, CreateExampleParams, DeleteExampleParams, DeleteResponse, Example, ExamplePage,
  GetExampleParams, ListExampleParams, SortBy, SortOrder, UpdateExampleParams,
};
