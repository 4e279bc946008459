//! Examples client that reads through the shared query cache and keeps it
//! in sync on writes.

use chrono::Utc;
use tracing::{debug, error};

use super::cache::{
  example_key, example_list_key, example_list_with_params_options, example_list_options,
  example_options,
};
use super::client::ExampleClient;
use super::schema::Validate;
use super::types::{
  now_timestamp, CreateExampleParams, DeleteExampleParams, DeleteResponse, Example, ExamplePage,
  ListExampleParams, UpdateExampleParams,
};
use crate::cache::{CacheResult, QueryClient};
use crate::error::ApiError;
use crate::mutation::Mutation;

/// Cache contents captured before an optimistic create.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSnapshot {
  pub previous_examples: Option<Vec<Example>>,
}

/// Cache contents captured before an optimistic update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSnapshot {
  pub previous_list: Option<Vec<Example>>,
  pub previous_example: Option<Example>,
}

/// Examples client with cached reads and cache-synchronizing writes.
///
/// Reads go through [`QueryClient`] with a five minute stale time. Writes are
/// [`Mutation`]s whose hooks invalidate, overwrite or remove the affected
/// entries; the `_optimistic` variants write the expected result into the
/// cache before the request and restore the previous contents if it fails.
#[derive(Clone)]
pub struct CachedExampleClient {
  inner: ExampleClient,
  queries: QueryClient,
}

impl CachedExampleClient {
  pub fn new(inner: ExampleClient, queries: QueryClient) -> Self {
    Self { inner, queries }
  }

  pub fn queries(&self) -> &QueryClient {
    &self.queries
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  /// Full list under `["example-list"]`.
  pub async fn list_examples(&self) -> Result<CacheResult<Vec<Example>>, ApiError> {
    let options = example_list_options(&self.inner);
    self.queries.fetch_query(&options).await
  }

  /// One page under `["example-list", params]`.
  pub async fn list_examples_page(
    &self,
    params: ListExampleParams,
  ) -> Result<CacheResult<ExamplePage>, ApiError> {
    params.validate()?;
    let options = example_list_with_params_options(&self.inner, params)?;
    self.queries.fetch_query(&options).await
  }

  /// Single entity under `["example", id]`.
  ///
  /// Without a usable id nothing is fetched and only already cached data can
  /// be returned.
  pub async fn get_example(&self, id: Option<u64>) -> Result<Option<CacheResult<Example>>, ApiError> {
    let options = example_options(&self.inner, id);
    self.queries.query(&options).await
  }

  // ==========================================================================
  // Writes
  // ==========================================================================

  /// POST, then mark every list stale.
  pub fn create_mutation(&self) -> Mutation<CreateExampleParams, Example> {
    let api = self.inner.clone();
    Mutation::new(self.queries.clone(), move |params: &CreateExampleParams| {
      let api = api.clone();
      let params = params.clone();
      async move { api.create_example(&params).await }
    })
    .validate(|params| params.validate())
    .on_success(|client, created, _, _| {
      debug!(id = created.id, "example created, invalidating lists");
      client.invalidate_queries(&example_list_key());
    })
    .on_error(|_, err, _, _| {
      error!(error = %err, "failed to create example");
    })
  }

  /// PUT, then mark every list stale and store the returned entity.
  pub fn update_mutation(&self) -> Mutation<UpdateExampleParams, Example> {
    let api = self.inner.clone();
    Mutation::new(self.queries.clone(), move |params: &UpdateExampleParams| {
      let api = api.clone();
      let params = params.clone();
      async move { api.update_example(&params).await }
    })
    .validate(|params| params.validate())
    .on_success(|client, updated, params, _| {
      client.invalidate_queries(&example_list_key());
      client.set_query_data(example_key(params.id), updated.clone());
    })
    .on_error(|_, err, params, _| {
      error!(id = params.id, error = %err, "failed to update example");
    })
  }

  /// DELETE, then mark every list stale and drop the entity entry.
  pub fn delete_mutation(&self) -> Mutation<DeleteExampleParams, DeleteResponse> {
    let api = self.inner.clone();
    Mutation::new(self.queries.clone(), move |params: &DeleteExampleParams| {
      let api = api.clone();
      let params = *params;
      async move { api.delete_example(&params).await }
    })
    .validate(|params| params.validate())
    .on_success(|client, _, params, _| {
      client.invalidate_queries(&example_list_key());
      client.remove_queries(&example_key(params.id));
    })
    .on_error(|_, err, params, _| {
      error!(id = params.id, error = %err, "failed to delete example");
    })
  }

  /// Create that appends a placeholder to the cached list right away.
  ///
  /// The placeholder carries the submitted fields, an id taken from the
  /// current epoch milliseconds and `now` for both timestamps. Nothing is
  /// written when no list is cached.
  pub fn create_optimistic_mutation(
    &self,
  ) -> Mutation<CreateExampleParams, Example, CreateSnapshot> {
    let api = self.inner.clone();
    Mutation::with_context(
      self.queries.clone(),
      move |params: &CreateExampleParams| {
        let api = api.clone();
        let params = params.clone();
        async move { api.create_example(&params).await }
      },
      |client, params| {
        let key = example_list_key();
        client.cancel_queries(&key);

        let previous_examples = client.get_query_data::<Vec<Example>>(&key);
        if let Some(examples) = &previous_examples {
          let placeholder = params
            .clone()
            .into_example(placeholder_id(), &now_timestamp());
          debug!(id = placeholder.id, "optimistically appending example");
          let mut next = examples.clone();
          next.push(placeholder);
          client.set_query_data(key, next);
        }

        CreateSnapshot { previous_examples }
      },
    )
    .validate(|params| params.validate())
    .on_error(|client, err, _, snapshot| {
      error!(error = %err, "failed to create example, rolling back");
      if let Some(previous) = &snapshot.previous_examples {
        client.set_query_data(example_list_key(), previous.clone());
      }
    })
    .on_settled(|client, _, _| {
      client.invalidate_queries(&example_list_key());
    })
  }

  /// Update that merges the submitted fields into the cached list element
  /// and the cached entity right away, refreshing `updatedAt`.
  pub fn update_optimistic_mutation(
    &self,
  ) -> Mutation<UpdateExampleParams, Example, UpdateSnapshot> {
    let api = self.inner.clone();
    Mutation::with_context(
      self.queries.clone(),
      move |params: &UpdateExampleParams| {
        let api = api.clone();
        let params = params.clone();
        async move { api.update_example(&params).await }
      },
      |client, params| {
        let list_key = example_list_key();
        let item_key = example_key(params.id);
        client.cancel_queries(&list_key);
        client.cancel_queries(&item_key);

        let previous_list = client.get_query_data::<Vec<Example>>(&list_key);
        let previous_example = client.get_query_data::<Example>(&item_key);
        let now = now_timestamp();
        let merge = |example: &Example| Example {
          updated_at: now.clone(),
          ..params.apply_to(example)
        };

        if let Some(list) = &previous_list {
          let next: Vec<Example> = list
            .iter()
            .map(|example| {
              if example.id == params.id {
                merge(example)
              } else {
                example.clone()
              }
            })
            .collect();
          client.set_query_data(list_key, next);
        }
        if let Some(example) = &previous_example {
          client.set_query_data(item_key, merge(example));
        }
        debug!(id = params.id, "optimistically updated example");

        UpdateSnapshot {
          previous_list,
          previous_example,
        }
      },
    )
    .validate(|params| params.validate())
    .on_error(|client, err, params, snapshot| {
      error!(id = params.id, error = %err, "failed to update example, rolling back");
      if let Some(list) = &snapshot.previous_list {
        client.set_query_data(example_list_key(), list.clone());
      }
      if let Some(example) = &snapshot.previous_example {
        client.set_query_data(example_key(params.id), example.clone());
      }
    })
    .on_settled(|client, _, params| {
      client.invalidate_queries(&example_list_key());
      client.invalidate_queries(&example_key(params.id));
    })
  }

  pub async fn create_example(&self, params: CreateExampleParams) -> Result<Example, ApiError> {
    self.create_mutation().mutate(params).await
  }

  pub async fn update_example(&self, params: UpdateExampleParams) -> Result<Example, ApiError> {
    self.update_mutation().mutate(params).await
  }

  pub async fn delete_example(&self, params: DeleteExampleParams) -> Result<DeleteResponse, ApiError> {
    self.delete_mutation().mutate(params).await
  }

  pub async fn create_example_optimistic(
    &self,
    params: CreateExampleParams,
  ) -> Result<Example, ApiError> {
    self.create_optimistic_mutation().mutate(params).await
  }

  pub async fn update_example_optimistic(
    &self,
    params: UpdateExampleParams,
  ) -> Result<Example, ApiError> {
    self.update_optimistic_mutation().mutate(params).await
  }
}

/// Temporary id for an optimistic entity until the server assigns one.
fn placeholder_id() -> u64 {
  Utc::now().timestamp_millis().max(1) as u64
}
