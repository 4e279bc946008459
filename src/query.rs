//! Query descriptions for data fetching with caching support.
//!
//! Inspired by TanStack Query, a [`QueryOptions<T>`] bundles a cache key, a
//! fetcher and the freshness rules for one read. The options are handed to
//! [`QueryClient`](crate::cache::QueryClient), which decides whether the
//! fetcher runs or the cached value is served.
//!
//! # Example
//!
//! ```ignore
//! let api = example_client.clone();
//! let options = QueryOptions::new(QueryKey::new("example-list"), move || {
//!     let api = api.clone();
//!     async move { api.list_examples().await }
//! })
//! .with_stale_time(Duration::minutes(5));
//!
//! let result = query_client.fetch_query(&options).await?;
//! ```

use chrono::Duration;
use std::future::Future;
use std::pin::Pin;

use crate::cache::QueryKey;
use crate::error::ApiError;

/// A boxed future that returns a Result<T, ApiError>
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// How to fetch and cache one query.
pub struct QueryOptions<T> {
  key: QueryKey,
  fetcher: FetcherFn<T>,
  stale_time: Duration,
  enabled: bool,
}

impl<T: Send + 'static> QueryOptions<T> {
  /// Create query options with the given key and fetcher.
  ///
  /// The fetcher is a closure that returns a future. It is called each time
  /// the query client decides the cached value cannot be used.
  pub fn new<F, Fut>(key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      key,
      fetcher: Box::new(move || Box::pin(fetcher())),
      stale_time: Duration::zero(),
      enabled: true,
    }
  }

  /// Set the stale time for this query.
  ///
  /// Cached data younger than this is served without calling the fetcher.
  /// Defaults to zero: every read refetches.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  /// A disabled query never calls its fetcher; reads only see what is
  /// already cached.
  pub fn enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  pub fn stale_time(&self) -> Duration {
    self.stale_time
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub(crate) fn fetch(&self) -> BoxFuture<T> {
    (self.fetcher)()
  }
}

impl<T> std::fmt::Debug for QueryOptions<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryOptions")
      .field("key", &self.key)
      .field("stale_time", &self.stale_time)
      .field("enabled", &self.enabled)
      .finish_non_exhaustive()
  }
}
