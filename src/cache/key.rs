//! Query keys: tuples that address cache entries.

use serde::Serialize;
use std::fmt;

use crate::error::ApiError;

/// One element of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
  /// A fixed scope name such as `"example-list"`
  Tag(String),
  /// A numeric identifier
  Id(u64),
  /// Serialized parameters, in canonical (sorted-field) JSON form
  Params(String),
}

impl fmt::Display for KeyPart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Tag(tag) => write!(f, "{:?}", tag),
      Self::Id(id) => write!(f, "{}", id),
      Self::Params(json) => f.write_str(json),
    }
  }
}

/// Address of a cached query result, e.g. `["example", 3]`.
///
/// Entries are stored under exact keys. Filters used to invalidate, cancel
/// or remove entries match by prefix, so `["example-list"]` covers both the
/// full list and every `["example-list", {params}]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
  pub fn new(tag: impl Into<String>) -> Self {
    Self(vec![KeyPart::Tag(tag.into())])
  }

  pub fn with_id(mut self, id: u64) -> Self {
    self.0.push(KeyPart::Id(id));
    self
  }

  /// Append serialized parameters.
  ///
  /// Equal parameter values always produce equal keys, whatever the field
  /// order of the source type.
  pub fn with_params<P: Serialize + ?Sized>(mut self, params: &P) -> Result<Self, ApiError> {
    let value = serde_json::to_value(params).map_err(ApiError::Encode)?;
    self.0.push(KeyPart::Params(value.to_string()));
    Ok(self)
  }

  pub fn parts(&self) -> &[KeyPart] {
    &self.0
  }

  /// Whether `prefix` addresses this key (equal keys included).
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    self.0.starts_with(&prefix.0)
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("[")?;
    for (i, part) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(",")?;
      }
      write!(f, "{}", part)?;
    }
    f.write_str("]")
  }
}
