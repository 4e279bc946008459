//! Client navigation, used to send the user to the login view.

use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Path of the login view.
pub const LOGIN_PATH: &str = "/login";

/// Something that can move the client to another view.
pub trait Navigator: Send + Sync {
  fn navigate(&self, path: &str);
}

/// Tracks the client's current location.
#[derive(Debug)]
pub struct Location {
  href: Mutex<String>,
}

impl Location {
  pub fn new(initial: impl Into<String>) -> Self {
    Self {
      href: Mutex::new(initial.into()),
    }
  }

  /// The current location.
  pub fn href(&self) -> String {
    self
      .href
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }
}

impl Default for Location {
  fn default() -> Self {
    Self::new("/")
  }
}

impl Navigator for Location {
  fn navigate(&self, path: &str) {
    let mut href = self.href.lock().unwrap_or_else(PoisonError::into_inner);
    warn!(from = %href, to = path, "redirecting");
    *href = path.to_string();
  }
}
