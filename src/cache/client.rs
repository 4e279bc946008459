//! Process-wide query cache shared by reads and mutations.

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, Abortable};
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

use super::key::QueryKey;
use super::traits::{CacheEvent, CacheResult, CacheSource};
use crate::error::ApiError;
use crate::query::QueryOptions;

type Data = Arc<dyn Any + Send + Sync>;

const EVENT_CAPACITY: usize = 64;

/// A fetch currently running for an entry.
struct InFlight {
  id: u64,
  handle: AbortHandle,
}

#[derive(Default)]
struct CacheEntry {
  data: Option<Data>,
  /// When `data` was last written
  updated_at: Option<DateTime<Utc>>,
  /// Marked stale explicitly, regardless of age
  invalidated: bool,
  fetches: Vec<InFlight>,
}

impl CacheEntry {
  fn cached<T: Clone + 'static>(&self, stale_time: chrono::Duration) -> Option<CacheResult<T>> {
    let data = self.data.as_ref()?.downcast_ref::<T>()?;
    let updated_at = self.updated_at?;
    let is_stale = self.invalidated || Utc::now() - updated_at > stale_time;
    Some(CacheResult::from_cache(data.clone(), updated_at, is_stale))
  }

  fn abort_fetches(&mut self) -> usize {
    let count = self.fetches.len();
    for fetch in self.fetches.drain(..) {
      fetch.handle.abort();
    }
    count
  }
}

/// Removes a fetch from the registry when dropped. Unregistering an id
/// that is already gone is a no-op.
struct FetchGuard<'a> {
  client: &'a QueryClient,
  key: &'a QueryKey,
  fetch_id: u64,
}

impl Drop for FetchGuard<'_> {
  fn drop(&mut self) {
    if self.client.unregister_fetch(self.key, self.fetch_id) {
      debug!(key = %self.key, fetch_id = self.fetch_id, "fetch abandoned");
    }
  }
}

struct Inner {
  entries: Mutex<HashMap<QueryKey, CacheEntry>>,
  next_fetch_id: AtomicU64,
  events: broadcast::Sender<CacheEvent>,
}

/// Key-addressed cache of query results.
///
/// Cloning is cheap and every clone shares the same store. Writes are
/// last-write-wins per key. The store lock is never held across an await,
/// so cache operations are atomic with respect to each other.
///
/// Entries are never garbage-collected: each distinct key, such as every
/// `["example-list", params]` a process reads, stays in memory until
/// [`remove_queries`](QueryClient::remove_queries) drops it or the client
/// goes away. Long-running consumers that read many parameter sets should
/// remove the scopes they no longer need.
#[derive(Clone)]
pub struct QueryClient {
  inner: Arc<Inner>,
}

impl Default for QueryClient {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryClient {
  pub fn new() -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      inner: Arc::new(Inner {
        entries: Mutex::new(HashMap::new()),
        next_fetch_id: AtomicU64::new(1),
        events,
      }),
    }
  }

  /// Receive a [`CacheEvent`] for every write, invalidation and removal.
  pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
    self.inner.events.subscribe()
  }

  fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
    // Entries are plain data and stay consistent even if a holder panicked
    self
      .inner
      .entries
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }

  fn emit(&self, events: Vec<CacheEvent>) {
    for event in events {
      // No subscribers is fine
      let _ = self.inner.events.send(event);
    }
  }

  /// Fetch with a cache-first strategy.
  ///
  /// 1. If the entry is fresh (younger than the stale time and not
  ///    invalidated), return it without calling the fetcher
  /// 2. Otherwise run the fetcher and store its result
  ///
  /// Like TanStack's `fetchQuery`, this ignores `enabled`; see [`query`].
  /// The fetch is registered so [`cancel_queries`] can abort it; a cancelled
  /// fetch never writes and resolves to [`ApiError::Cancelled`].
  ///
  /// [`query`]: QueryClient::query
  /// [`cancel_queries`]: QueryClient::cancel_queries
  pub async fn fetch_query<T>(&self, options: &QueryOptions<T>) -> Result<CacheResult<T>, ApiError>
  where
    T: Clone + Send + Sync + 'static,
  {
    let key = options.key();

    if let Some(hit) = self.cached::<T>(key, options.stale_time()) {
      if hit.source == CacheSource::CacheFresh {
        debug!(%key, "cache hit");
        return Ok(hit);
      }
    }

    let (handle, registration) = AbortHandle::new_pair();
    let fetch_id = self.register_fetch(key, handle);
    // Unregisters on every exit, including when the caller drops this future
    let _in_flight = FetchGuard {
      client: self,
      key,
      fetch_id,
    };
    debug!(%key, fetch_id, "fetching");

    match Abortable::new(options.fetch(), registration).await {
      Err(_aborted) => {
        debug!(%key, fetch_id, "fetch cancelled");
        Err(ApiError::Cancelled)
      }
      Ok(Err(e)) => Err(e),
      Ok(Ok(data)) => {
        if self.complete_fetch(key, fetch_id, data.clone()) {
          Ok(CacheResult::from_network(data))
        } else {
          // Cancelled or removed after the response arrived
          debug!(%key, fetch_id, "discarding result of cancelled fetch");
          Err(ApiError::Cancelled)
        }
      }
    }
  }

  /// Read the way a UI observer would: disabled queries return whatever is
  /// cached (possibly nothing) and never call the fetcher.
  pub async fn query<T>(&self, options: &QueryOptions<T>) -> Result<Option<CacheResult<T>>, ApiError>
  where
    T: Clone + Send + Sync + 'static,
  {
    if !options.is_enabled() {
      debug!(key = %options.key(), "query disabled, not fetching");
      return Ok(self.cached(options.key(), options.stale_time()));
    }
    self.fetch_query(options).await.map(Some)
  }

  fn cached<T: Clone + 'static>(
    &self,
    key: &QueryKey,
    stale_time: chrono::Duration,
  ) -> Option<CacheResult<T>> {
    self.entries().get(key)?.cached(stale_time)
  }

  fn register_fetch(&self, key: &QueryKey, handle: AbortHandle) -> u64 {
    let id = self.inner.next_fetch_id.fetch_add(1, Ordering::Relaxed);
    self
      .entries()
      .entry(key.clone())
      .or_default()
      .fetches
      .push(InFlight { id, handle });
    id
  }

  fn unregister_fetch(&self, key: &QueryKey, fetch_id: u64) -> bool {
    let mut entries = self.entries();
    let Some(entry) = entries.get_mut(key) else {
      return false;
    };
    let before = entry.fetches.len();
    entry.fetches.retain(|f| f.id != fetch_id);
    entry.fetches.len() != before
  }

  fn complete_fetch<T: Send + Sync + 'static>(&self, key: &QueryKey, fetch_id: u64, data: T) -> bool {
    {
      let mut entries = self.entries();
      let Some(entry) = entries.get_mut(key) else {
        return false;
      };
      let before = entry.fetches.len();
      entry.fetches.retain(|f| f.id != fetch_id);
      if entry.fetches.len() == before {
        return false;
      }
      entry.data = Some(Arc::new(data));
      entry.updated_at = Some(Utc::now());
      entry.invalidated = false;
    }
    self.emit(vec![CacheEvent::Updated(key.clone())]);
    true
  }

  /// Get the data cached under exactly `key`, fresh or not.
  pub fn get_query_data<T: Clone + 'static>(&self, key: &QueryKey) -> Option<T> {
    let entries = self.entries();
    entries.get(key)?.data.as_ref()?.downcast_ref::<T>().cloned()
  }

  /// Overwrite the data under `key`. The entry becomes fresh.
  pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, data: T) {
    {
      let mut entries = self.entries();
      let entry = entries.entry(key.clone()).or_default();
      entry.data = Some(Arc::new(data));
      entry.updated_at = Some(Utc::now());
      entry.invalidated = false;
    }
    debug!(%key, "cache entry set");
    self.emit(vec![CacheEvent::Updated(key)]);
  }

  /// When the data under `key` was last written.
  pub fn data_updated_at(&self, key: &QueryKey) -> Option<DateTime<Utc>> {
    self.entries().get(key)?.updated_at
  }

  /// Whether `key` was explicitly marked stale since its last write.
  pub fn is_invalidated(&self, key: &QueryKey) -> bool {
    self.entries().get(key).is_some_and(|e| e.invalidated)
  }

  /// Number of fetches currently running for `key`.
  pub fn fetch_count(&self, key: &QueryKey) -> usize {
    self.entries().get(key).map_or(0, |e| e.fetches.len())
  }

  /// Mark every entry under `filter` stale so the next read refetches.
  ///
  /// Returns the number of entries marked.
  pub fn invalidate_queries(&self, filter: &QueryKey) -> usize {
    let events: Vec<CacheEvent> = {
      let mut entries = self.entries();
      entries
        .iter_mut()
        .filter(|(key, _)| key.starts_with(filter))
        .map(|(key, entry)| {
          entry.invalidated = true;
          CacheEvent::Invalidated(key.clone())
        })
        .collect()
    };
    debug!(%filter, count = events.len(), "invalidated queries");
    let count = events.len();
    self.emit(events);
    count
  }

  /// Abort every in-flight fetch under `filter`. Cached data is untouched.
  ///
  /// Returns the number of fetches aborted.
  pub fn cancel_queries(&self, filter: &QueryKey) -> usize {
    let count: usize = self
      .entries()
      .iter_mut()
      .filter(|(key, _)| key.starts_with(filter))
      .map(|(_, entry)| entry.abort_fetches())
      .sum();
    if count > 0 {
      debug!(%filter, count, "cancelled in-flight fetches");
    }
    count
  }

  /// Drop every entry under `filter`, aborting its in-flight fetches.
  ///
  /// Returns the number of entries removed.
  pub fn remove_queries(&self, filter: &QueryKey) -> usize {
    let events: Vec<CacheEvent> = {
      let mut entries = self.entries();
      let keys: Vec<QueryKey> = entries
        .keys()
        .filter(|key| key.starts_with(filter))
        .cloned()
        .collect();
      keys
        .into_iter()
        .filter_map(|key| {
          let mut entry = entries.remove(&key)?;
          entry.abort_fetches();
          Some(CacheEvent::Removed(key))
        })
        .collect()
    };
    debug!(%filter, count = events.len(), "removed queries");
    let count = events.len();
    self.emit(events);
    count
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use std::sync::atomic::AtomicU32;

  fn counting_options(
    key: QueryKey,
    counter: Arc<AtomicU32>,
  ) -> QueryOptions<u32> {
    QueryOptions::new(key, move || {
      let counter = counter.clone();
      async move { Ok(counter.fetch_add(1, Ordering::SeqCst) + 1) }
    })
  }

  #[tokio::test]
  async fn test_fresh_entry_served_from_cache() {
    let client = QueryClient::new();
    let counter = Arc::new(AtomicU32::new(0));
    let options = counting_options(QueryKey::new("n"), counter.clone())
      .with_stale_time(Duration::minutes(5));

    let first = client.fetch_query(&options).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert_eq!(first.data, 1);

    let second = client.fetch_query(&options).await.unwrap();
    assert_eq!(second.source, CacheSource::CacheFresh);
    assert_eq!(second.data, 1);
    assert!(second.cached_at.is_some());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_zero_stale_time_always_refetches() {
    let client = QueryClient::new();
    let counter = Arc::new(AtomicU32::new(0));
    let options = counting_options(QueryKey::new("n"), counter.clone());

    client.fetch_query(&options).await.unwrap();
    let second = client.fetch_query(&options).await.unwrap();

    assert_eq!(second.source, CacheSource::Network);
    assert_eq!(second.data, 2);
  }

  #[tokio::test]
  async fn test_invalidation_forces_refetch() {
    let client = QueryClient::new();
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::new("list").with_id(1);
    let options = counting_options(key.clone(), counter.clone())
      .with_stale_time(Duration::minutes(5));

    client.fetch_query(&options).await.unwrap();
    assert_eq!(client.invalidate_queries(&QueryKey::new("list")), 1);
    assert!(client.is_invalidated(&key));

    // Invalidation keeps the data around until the refetch lands
    assert_eq!(client.get_query_data::<u32>(&key), Some(1));

    let refetched = client.fetch_query(&options).await.unwrap();
    assert_eq!(refetched.source, CacheSource::Network);
    assert_eq!(refetched.data, 2);
    assert!(!client.is_invalidated(&key));
  }

  #[tokio::test]
  async fn test_fetch_error_leaves_cache_untouched() {
    let client = QueryClient::new();
    let key = QueryKey::new("n");
    client.set_query_data(key.clone(), 7u32);
    client.invalidate_queries(&key);

    let options = QueryOptions::<u32>::new(key.clone(), || async {
      Err(ApiError::Http {
        status: 503,
        body: String::new(),
      })
    });

    let err = client.fetch_query(&options).await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 503, .. }));
    assert_eq!(client.get_query_data::<u32>(&key), Some(7));
    assert_eq!(client.fetch_count(&key), 0);
  }

  #[tokio::test]
  async fn test_disabled_query_never_fetches() {
    let client = QueryClient::new();
    let counter = Arc::new(AtomicU32::new(0));
    let key = QueryKey::new("n");
    let options = counting_options(key.clone(), counter.clone()).enabled(false);

    assert_eq!(client.query(&options).await.unwrap(), None);

    // Cached data is still visible, flagged stale
    client.set_query_data(key.clone(), 40u32);
    let cached = client.query(&options).await.unwrap().unwrap();
    assert_eq!(cached.data, 40);
    assert!(cached.is_from_cache());

    assert_eq!(counter.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_cancel_aborts_in_flight_fetch() {
    let client = QueryClient::new();
    let key = QueryKey::new("slow");
    let options = QueryOptions::new(key.clone(), || async {
      tokio::time::sleep(std::time::Duration::from_millis(200)).await;
      Ok::<_, ApiError>(99u32)
    });

    let task = {
      let client = client.clone();
      tokio::spawn(async move { client.fetch_query(&options).await })
    };

    // Wait until the fetch is registered
    while client.fetch_count(&key) == 0 {
      tokio::task::yield_now().await;
    }
    client.set_query_data(key.clone(), 1u32);
    assert_eq!(client.cancel_queries(&key), 1);

    let result = task.await.unwrap();
    assert!(matches!(result, Err(ApiError::Cancelled)));
    // The optimistic value survives
    assert_eq!(client.get_query_data::<u32>(&key), Some(1));
  }

  #[tokio::test]
  async fn test_dropped_fetch_leaves_no_registration() {
    let client = QueryClient::new();
    let key = QueryKey::new("slow");
    let options = QueryOptions::new(key.clone(), || async {
      tokio::time::sleep(std::time::Duration::from_millis(200)).await;
      Ok::<_, ApiError>(1u32)
    });

    for _ in 0..5 {
      let timed_out =
        tokio::time::timeout(std::time::Duration::from_millis(10), client.fetch_query(&options)).await;
      assert!(timed_out.is_err());
    }
    assert_eq!(client.fetch_count(&key), 0);
    assert_eq!(client.get_query_data::<u32>(&key), None);

    // A fetch that runs to completion still lands
    let fetched = client.fetch_query(&options).await.unwrap();
    assert_eq!(fetched.data, 1);
    assert_eq!(client.fetch_count(&key), 0);
  }

  #[tokio::test]
  async fn test_failed_fetch_leaves_no_registration() {
    let client = QueryClient::new();
    let key = QueryKey::new("broken");
    let options = QueryOptions::<u32>::new(key.clone(), || async { Err(ApiError::NotFound) });

    for _ in 0..3 {
      assert!(client.fetch_query(&options).await.is_err());
    }
    assert_eq!(client.fetch_count(&key), 0);
  }

  #[tokio::test]
  async fn test_remove_queries_by_prefix() {
    let client = QueryClient::new();
    let one = QueryKey::new("example").with_id(1);
    let two = QueryKey::new("example").with_id(2);
    let list = QueryKey::new("example-list");
    client.set_query_data(one.clone(), "a".to_string());
    client.set_query_data(two.clone(), "b".to_string());
    client.set_query_data(list.clone(), vec!["a".to_string()]);

    assert_eq!(client.remove_queries(&one), 1);
    assert_eq!(client.get_query_data::<String>(&one), None);
    assert_eq!(client.get_query_data::<String>(&two).as_deref(), Some("b"));

    assert_eq!(client.remove_queries(&QueryKey::new("example")), 1);
    assert_eq!(client.get_query_data::<String>(&two), None);
    assert!(client.get_query_data::<Vec<String>>(&list).is_some());
  }

  #[tokio::test]
  async fn test_type_mismatch_reads_as_miss() {
    let client = QueryClient::new();
    let key = QueryKey::new("n");
    client.set_query_data(key.clone(), 1u32);
    assert_eq!(client.get_query_data::<String>(&key), None);
  }

  #[tokio::test]
  async fn test_events_are_broadcast() {
    let client = QueryClient::new();
    let mut events = client.subscribe();
    let key = QueryKey::new("example").with_id(5);

    client.set_query_data(key.clone(), 5u32);
    client.invalidate_queries(&key);
    client.remove_queries(&key);

    assert_eq!(events.recv().await.unwrap(), CacheEvent::Updated(key.clone()));
    assert_eq!(
      events.recv().await.unwrap(),
      CacheEvent::Invalidated(key.clone())
    );
    assert_eq!(events.recv().await.unwrap(), CacheEvent::Removed(key));
  }
}
