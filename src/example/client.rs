//! Uncached REST client for the examples resource.

use tracing::debug;

use super::schema::Validate;
use super::types::{
  CreateExampleParams, DeleteExampleParams, DeleteResponse, Example, ExamplePage,
  GetExampleParams, ListExampleParams, UpdateExampleParams,
};
use crate::error::ApiError;
use crate::http::HttpClient;

/// Collection path, relative to the API base URL.
pub const RESOURCE: &str = "examples";

/// Typed calls against the examples endpoints.
///
/// Inputs are validated before a request is built, and entities in
/// responses are validated before they are returned.
#[derive(Clone)]
pub struct ExampleClient {
  http: HttpClient,
}

impl ExampleClient {
  pub fn new(http: HttpClient) -> Self {
    Self { http }
  }

  pub fn http(&self) -> &HttpClient {
    &self.http
  }

  fn item_path(id: u64) -> String {
    format!("{}/{}", RESOURCE, id)
  }

  /// `GET examples`
  pub async fn list_examples(&self) -> Result<Vec<Example>, ApiError> {
    let examples: Vec<Example> = self.http.get(RESOURCE).await?;
    examples.validate()?;
    debug!(count = examples.len(), "listed examples");
    Ok(examples)
  }

  /// `GET examples?page=..&limit=..&sortBy=..&sortOrder=..[&search=..]`
  pub async fn list_examples_page(&self, params: &ListExampleParams) -> Result<ExamplePage, ApiError> {
    params.validate()?;
    let page: ExamplePage = self.http.get_with_query(RESOURCE, params).await?;
    page.validate()?;
    debug!(page = page.page, total = page.total, "listed example page");
    Ok(page)
  }

  /// `GET examples/{id}`
  pub async fn get_example(&self, params: &GetExampleParams) -> Result<Example, ApiError> {
    params.validate()?;
    let example: Example = self.http.get(&Self::item_path(params.id)).await?;
    example.validate()?;
    Ok(example)
  }

  /// `POST examples`
  pub async fn create_example(&self, params: &CreateExampleParams) -> Result<Example, ApiError> {
    params.validate()?;
    let example: Example = self.http.post(RESOURCE, params).await?;
    example.validate()?;
    debug!(id = example.id, "created example");
    Ok(example)
  }

  /// `PUT examples/{id}` with the full parameter object as body.
  pub async fn update_example(&self, params: &UpdateExampleParams) -> Result<Example, ApiError> {
    params.validate()?;
    let example: Example = self.http.put(&Self::item_path(params.id), params).await?;
    example.validate()?;
    debug!(id = example.id, "updated example");
    Ok(example)
  }

  /// `DELETE examples/{id}`
  pub async fn delete_example(&self, params: &DeleteExampleParams) -> Result<DeleteResponse, ApiError> {
    params.validate()?;
    let response: DeleteResponse = self.http.delete(&Self::item_path(params.id)).await?;
    debug!(id = params.id, success = response.success, "deleted example");
    Ok(response)
  }
}
