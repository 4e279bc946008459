//! Request/response interceptors run by [`HttpClient`](super::HttpClient).

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, Request, StatusCode, Url};
use std::sync::Arc;
use tracing::{error, warn};

use crate::navigation::{Navigator, LOGIN_PATH};
use crate::storage::{Storage, TOKEN_KEY};

/// Interceptor invoked around every request, in registration order.
///
/// Hooks observe and decorate traffic; they cannot cancel a request or
/// swallow a response.
pub trait Hook: Send + Sync {
  /// Called after the request is built and before it is sent.
  fn before_request(&self, _request: &mut Request) {}

  /// Called once the response status is known, before the body is read.
  fn after_response(&self, _method: &Method, _url: &Url, _status: StatusCode) {}
}

/// Attaches the stored token as a bearer credential.
pub struct BearerAuth {
  storage: Arc<dyn Storage>,
}

impl BearerAuth {
  pub fn new(storage: Arc<dyn Storage>) -> Self {
    Self { storage }
  }
}

impl Hook for BearerAuth {
  fn before_request(&self, request: &mut Request) {
    let token = match self.storage.get_item(TOKEN_KEY) {
      Ok(Some(token)) if !token.is_empty() => token,
      Ok(_) => return,
      Err(e) => {
        warn!(error = %e, "failed to read auth token");
        return;
      }
    };

    match HeaderValue::from_str(&format!("Bearer {}", token)) {
      Ok(mut value) => {
        value.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, value);
      }
      Err(e) => warn!(error = %e, "stored auth token is not a valid header value"),
    }
  }
}

/// Clears the session and redirects to the login view on 401.
pub struct EvictOnUnauthorized {
  storage: Arc<dyn Storage>,
  navigator: Arc<dyn Navigator>,
}

impl EvictOnUnauthorized {
  pub fn new(storage: Arc<dyn Storage>, navigator: Arc<dyn Navigator>) -> Self {
    Self { storage, navigator }
  }
}

impl Hook for EvictOnUnauthorized {
  fn after_response(&self, method: &Method, url: &Url, status: StatusCode) {
    if status != StatusCode::UNAUTHORIZED {
      return;
    }

    warn!(%method, %url, "unauthorized response, clearing stored token");
    if let Err(e) = self.storage.remove_item(TOKEN_KEY) {
      error!(error = %e, "failed to evict auth token");
    }
    self.navigator.navigate(LOGIN_PATH);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::navigation::Location;
  use crate::storage::MemoryStorage;

  fn request() -> Request {
    Request::new(
      Method::GET,
      Url::parse("http://localhost:3000/examples").unwrap(),
    )
  }

  #[test]
  fn test_bearer_attached_when_token_present() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(TOKEN_KEY, "secret").unwrap();

    let mut req = request();
    BearerAuth::new(storage).before_request(&mut req);

    assert_eq!(
      req.headers().get(AUTHORIZATION).unwrap().to_str().unwrap(),
      "Bearer secret"
    );
  }

  #[test]
  fn test_no_header_without_token() {
    let storage = Arc::new(MemoryStorage::new());
    let mut req = request();
    BearerAuth::new(storage.clone()).before_request(&mut req);
    assert!(req.headers().get(AUTHORIZATION).is_none());

    // An empty token counts as absent
    storage.set_item(TOKEN_KEY, "").unwrap();
    BearerAuth::new(storage).before_request(&mut req);
    assert!(req.headers().get(AUTHORIZATION).is_none());
  }

  #[test]
  fn test_unauthorized_evicts_and_redirects() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(TOKEN_KEY, "expired").unwrap();
    let location = Arc::new(Location::new("/examples/3"));

    let hook = EvictOnUnauthorized::new(storage.clone(), location.clone());
    let url = Url::parse("http://localhost:3000/examples/3").unwrap();
    hook.after_response(&Method::PUT, &url, StatusCode::UNAUTHORIZED);

    assert_eq!(storage.get_item(TOKEN_KEY).unwrap(), None);
    assert_eq!(location.href(), "/login");
  }

  #[test]
  fn test_other_statuses_leave_session_alone() {
    let storage = Arc::new(MemoryStorage::new());
    storage.set_item(TOKEN_KEY, "valid").unwrap();
    let location = Arc::new(Location::default());

    let hook = EvictOnUnauthorized::new(storage.clone(), location.clone());
    let url = Url::parse("http://localhost:3000/examples").unwrap();
    for status in [StatusCode::OK, StatusCode::FORBIDDEN, StatusCode::INTERNAL_SERVER_ERROR] {
      hook.after_response(&Method::GET, &url, status);
    }

    assert_eq!(storage.get_item(TOKEN_KEY).unwrap().as_deref(), Some("valid"));
    assert_eq!(location.href(), "/");
  }
}
