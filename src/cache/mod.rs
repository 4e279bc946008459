//! Client-side query cache.
//!
//! This module provides a resource-agnostic caching mechanism that:
//! - Stores query results under tuple keys (`["example", 3]`)
//! - Serves fresh entries without refetching, refetches stale ones
//! - Supports invalidation, cancellation and removal by key prefix
//! - Broadcasts change events so consumers can re-read

mod client;
mod key;
mod traits;

pub use client::QueryClient;
pub use key::{KeyPart, QueryKey};
pub use traits::{CacheEvent, CacheResult, CacheSource};
