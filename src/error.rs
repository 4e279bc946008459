//! Error types shared by the HTTP client, the query cache and mutations.

use std::fmt;

/// A payload rejected by one of the schema validators.
///
/// Displays as `"<field> <message>"`, e.g. `name must not be empty`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
  pub field: &'static str,
  pub message: String,
}

impl ValidationError {
  pub fn new(field: &'static str, message: impl Into<String>) -> Self {
    Self {
      field,
      message: message.into(),
    }
  }
}

impl fmt::Display for ValidationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} {}", self.field, self.message)
  }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by reads and writes against the examples API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// Input rejected before any request was sent.
  #[error("invalid input: {0}")]
  Validation(#[from] ValidationError),

  /// The server answered 401. The stored token has already been evicted.
  #[error("unauthorized")]
  Unauthorized,

  /// The server answered 404.
  #[error("resource not found")]
  NotFound,

  /// Any other non-2xx status.
  #[error("HTTP {status}: {body}")]
  Http { status: u16, body: String },

  #[error("request timed out")]
  Timeout,

  /// Connection, DNS or protocol failure below HTTP.
  #[error("transport error: {0}")]
  Transport(#[source] reqwest::Error),

  /// The response body did not match the expected shape.
  #[error("failed to decode response: {0}")]
  Decode(#[source] serde_json::Error),

  /// The request payload could not be serialized.
  #[error("failed to encode request: {0}")]
  Encode(#[source] serde_json::Error),

  #[error("invalid request url: {0}")]
  InvalidUrl(#[from] url::ParseError),

  /// An in-flight fetch was cancelled before it could write to the cache.
  #[error("query was cancelled")]
  Cancelled,
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Timeout
    } else {
      ApiError::Transport(err)
    }
  }
}
