//! Core types describing cached reads.

use chrono::{DateTime, Utc};

/// A read result tagged with where it was served from.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// Write time of the served entry; `None` for network results
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Wrap an entry read from the store, written at `cached_at`.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>, is_stale: bool) -> Self {
    Self {
      data,
      source: if is_stale {
        CacheSource::CacheStale
      } else {
        CacheSource::CacheFresh
      },
      cached_at: Some(cached_at),
    }
  }

  pub fn is_from_cache(&self) -> bool {
    self.source != CacheSource::Network
  }
}

/// Origin of a [`CacheResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// The fetcher just ran
  Network,
  /// Served from the store within its stale time
  CacheFresh,
  /// Data from cache, stale or invalidated; only returned for disabled
  /// queries, which never refetch
  CacheStale,
}

/// Change notification broadcast by the query client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
  /// New data was written under the key
  Updated(super::QueryKey),
  /// The entry was marked stale and should be refetched on next access
  Invalidated(super::QueryKey),
  /// The entry was dropped from the cache
  Removed(super::QueryKey),
}
