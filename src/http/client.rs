use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::hooks::{BearerAuth, EvictOnUnauthorized, Hook};
use crate::error::ApiError;
use crate::navigation::Navigator;
use crate::storage::Storage;

/// How long any single request may take before failing with a timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client with a fixed base URL, timeout and interceptor chain.
///
/// Paths passed to the request methods are relative to the base URL, so
/// `"examples/3"` against `http://localhost:3000/` targets
/// `http://localhost:3000/examples/3`. Non-2xx statuses become errors after
/// the hooks have seen them.
#[derive(Clone)]
pub struct HttpClient {
  client: reqwest::Client,
  base_url: Url,
  hooks: Arc<[Arc<dyn Hook>]>,
}

impl HttpClient {
  /// Create the standard client: bearer auth from `storage`, and session
  /// eviction plus redirect through `navigator` on 401.
  pub fn new(
    base_url: &str,
    storage: Arc<dyn Storage>,
    navigator: Arc<dyn Navigator>,
  ) -> Result<Self, ApiError> {
    Self::builder(base_url)
      .hook(BearerAuth::new(storage.clone()))
      .hook(EvictOnUnauthorized::new(storage, navigator))
      .build()
  }

  pub fn builder(base_url: &str) -> HttpClientBuilder {
    HttpClientBuilder {
      base_url: base_url.to_string(),
      timeout: REQUEST_TIMEOUT,
      hooks: Vec::new(),
    }
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve a relative path against the base URL.
  pub fn url(&self, path: &str) -> Result<Url, ApiError> {
    Ok(self.base_url.join(path.trim_start_matches('/'))?)
  }

  pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    let request = self.request(Method::GET, path)?;
    self.execute(request).await
  }

  /// GET with `query` encoded as URL search parameters.
  pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, ApiError>
  where
    Q: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let request = self.request(Method::GET, path)?.query(query);
    self.execute(request).await
  }

  pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let request = with_json(self.request(Method::POST, path)?, body)?;
    self.execute(request).await
  }

  pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
  where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
  {
    let request = with_json(self.request(Method::PUT, path)?, body)?;
    self.execute(request).await
  }

  pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
    let request = self.request(Method::DELETE, path)?;
    self.execute(request).await
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
    Ok(self.client.request(method, self.url(path)?))
  }

  async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
    let mut request = builder.build()?;
    for hook in self.hooks.iter() {
      hook.before_request(&mut request);
    }

    let method = request.method().clone();
    let url = request.url().clone();
    debug!(%method, %url, "sending request");

    let response = self.client.execute(request).await?;
    let status = response.status();
    debug!(%method, %url, status = status.as_u16(), "received response");

    for hook in self.hooks.iter() {
      hook.after_response(&method, &url, status);
    }

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(match status.as_u16() {
        401 => ApiError::Unauthorized,
        404 => ApiError::NotFound,
        code => ApiError::Http { status: code, body },
      });
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ApiError::Decode)
  }
}

fn with_json<B: Serialize + ?Sized>(
  builder: RequestBuilder,
  body: &B,
) -> Result<RequestBuilder, ApiError> {
  let body = serde_json::to_vec(body).map_err(ApiError::Encode)?;
  Ok(
    builder
      .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
      .body(body),
  )
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder {
  base_url: String,
  timeout: Duration,
  hooks: Vec<Arc<dyn Hook>>,
}

impl HttpClientBuilder {
  /// Override the request timeout (defaults to [`REQUEST_TIMEOUT`]).
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Append a hook to the interceptor chain.
  pub fn hook(mut self, hook: impl Hook + 'static) -> Self {
    self.hooks.push(Arc::new(hook));
    self
  }

  pub fn build(self) -> Result<HttpClient, ApiError> {
    // Url::join drops the last path segment unless the base ends with '/'
    let base = if self.base_url.ends_with('/') {
      self.base_url
    } else {
      format!("{}/", self.base_url)
    };
    let base_url = Url::parse(&base)?;

    let client = reqwest::Client::builder().timeout(self.timeout).build()?;

    Ok(HttpClient {
      client,
      base_url,
      hooks: self.hooks.into(),
    })
  }
}
