//! Cache keys and query options for the examples resource.

use chrono::Duration;

use super::client::ExampleClient;
use super::types::{Example, ExamplePage, GetExampleParams, ListExampleParams};
use crate::cache::QueryKey;
use crate::error::ApiError;
use crate::query::QueryOptions;

/// Scope of every list entry, with or without parameters.
pub const EXAMPLE_LIST: &str = "example-list";
/// Scope of single-entity entries.
pub const EXAMPLE: &str = "example";

/// Reads younger than this are served from cache.
pub fn stale_time() -> Duration {
  Duration::minutes(5)
}

/// `["example-list"]`. Also the filter covering every list entry.
pub fn example_list_key() -> QueryKey {
  QueryKey::new(EXAMPLE_LIST)
}

/// `["example-list", params]`
pub fn example_list_with_params_key(params: &ListExampleParams) -> Result<QueryKey, ApiError> {
  example_list_key().with_params(params)
}

/// `["example", id]`
pub fn example_key(id: u64) -> QueryKey {
  QueryKey::new(EXAMPLE).with_id(id)
}

pub fn example_list_options(api: &ExampleClient) -> QueryOptions<Vec<Example>> {
  let api = api.clone();
  QueryOptions::new(example_list_key(), move || {
    let api = api.clone();
    async move { api.list_examples().await }
  })
  .with_stale_time(stale_time())
}

pub fn example_list_with_params_options(
  api: &ExampleClient,
  params: ListExampleParams,
) -> Result<QueryOptions<ExamplePage>, ApiError> {
  let key = example_list_with_params_key(&params)?;
  let api = api.clone();
  Ok(
    QueryOptions::new(key, move || {
      let api = api.clone();
      let params = params.clone();
      async move { api.list_examples_page(&params).await }
    })
    .with_stale_time(stale_time()),
  )
}

/// Single-entity read. Disabled when `id` is absent or zero, so it never
/// reaches the network without a usable id.
pub fn example_options(api: &ExampleClient, id: Option<u64>) -> QueryOptions<Example> {
  let id = id.unwrap_or(0);
  let api = api.clone();
  QueryOptions::new(example_key(id), move || {
    let api = api.clone();
    async move { api.get_example(&GetExampleParams { id }).await }
  })
  .with_stale_time(stale_time())
  .enabled(id != 0)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::KeyPart;
  use crate::http::HttpClient;

  fn api() -> ExampleClient {
    ExampleClient::new(HttpClient::builder("http://localhost:3000").build().unwrap())
  }

  #[test]
  fn test_list_and_entity_scopes_never_collide() {
    let list = example_list_key();
    let one = example_key(1);

    assert_ne!(list, one);
    assert!(!one.starts_with(&list));
    assert!(!list.starts_with(&one));
    assert_eq!(one.parts()[1], KeyPart::Id(1));
  }

  #[test]
  fn test_parameterized_list_is_under_list_scope() {
    let key = example_list_with_params_key(&ListExampleParams::default()).unwrap();
    assert!(key.starts_with(&example_list_key()));

    let other = example_list_with_params_key(&ListExampleParams {
      page: 2,
      ..Default::default()
    })
    .unwrap();
    assert_ne!(key, other);
  }

  #[test]
  fn test_single_entity_enabled_only_with_id() {
    assert!(!example_options(&api(), None).is_enabled());
    assert!(!example_options(&api(), Some(0)).is_enabled());

    let options = example_options(&api(), Some(4));
    assert!(options.is_enabled());
    assert_eq!(options.key(), &example_key(4));
    assert_eq!(options.stale_time(), Duration::minutes(5));
  }

  #[test]
  fn test_list_options_use_list_key() {
    let options = example_list_options(&api());
    assert_eq!(options.key(), &example_list_key());
    assert_eq!(options.stale_time(), stale_time());
  }
}
