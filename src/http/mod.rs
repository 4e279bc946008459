//! Pre-configured HTTP client shared by every resource operation.

mod client;
pub mod hooks;

pub use client::{HttpClient, HttpClientBuilder, REQUEST_TIMEOUT};
pub use hooks::{BearerAuth, EvictOnUnauthorized, Hook};
