//! Runtime validation for example payloads.
//!
//! Every shape is checked by the same small set of field rules, so a rule
//! change on the entity applies to each derived shape that carries the field.

use chrono::DateTime;

use super::types::{
  CreateExampleParams, DeleteExampleParams, Example, ExamplePage, GetExampleParams,
  ListExampleParams, UpdateExampleParams,
};
use crate::error::ValidationError;

/// Largest page size the list endpoint accepts.
pub const MAX_LIMIT: u32 = 100;

/// A payload that can check its own shape.
pub trait Validate {
  fn validate(&self) -> Result<(), ValidationError>;
}

fn positive_id(field: &'static str, id: u64) -> Result<(), ValidationError> {
  if id == 0 {
    return Err(ValidationError::new(field, "must be a positive integer"));
  }
  Ok(())
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
  if value.is_empty() {
    return Err(ValidationError::new(field, "must not be empty"));
  }
  Ok(())
}

fn finite(field: &'static str, value: f64) -> Result<(), ValidationError> {
  if !value.is_finite() {
    return Err(ValidationError::new(field, "must be a finite number"));
  }
  Ok(())
}

/// RFC 3339 with a literal `Z` designator. Numeric offsets, even `+00:00`,
/// are rejected.
fn utc_datetime(field: &'static str, value: &str) -> Result<(), ValidationError> {
  match DateTime::parse_from_rfc3339(value) {
    Ok(_) if value.ends_with('Z') => Ok(()),
    _ => Err(ValidationError::new(field, "must be an ISO 8601 UTC datetime")),
  }
}

fn in_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
  if value < min || value > max {
    return Err(ValidationError::new(
      field,
      format!("must be between {} and {}", min, max),
    ));
  }
  Ok(())
}

impl Validate for Example {
  fn validate(&self) -> Result<(), ValidationError> {
    positive_id("id", self.id)?;
    non_empty("name", &self.name)?;
    finite("count", self.count)?;
    utc_datetime("createdAt", &self.created_at)?;
    utc_datetime("updatedAt", &self.updated_at)
  }
}

impl Validate for CreateExampleParams {
  fn validate(&self) -> Result<(), ValidationError> {
    non_empty("name", &self.name)?;
    finite("count", self.count)
  }
}

impl Validate for UpdateExampleParams {
  fn validate(&self) -> Result<(), ValidationError> {
    positive_id("id", self.id)?;
    if let Some(name) = &self.name {
      non_empty("name", name)?;
    }
    if let Some(count) = self.count {
      finite("count", count)?;
    }
    Ok(())
  }
}

impl Validate for GetExampleParams {
  fn validate(&self) -> Result<(), ValidationError> {
    positive_id("id", self.id)
  }
}

impl Validate for DeleteExampleParams {
  fn validate(&self) -> Result<(), ValidationError> {
    positive_id("id", self.id)
  }
}

impl Validate for ListExampleParams {
  fn validate(&self) -> Result<(), ValidationError> {
    if self.page < 1 {
      return Err(ValidationError::new("page", "must be at least 1"));
    }
    in_range("limit", self.limit, 1, MAX_LIMIT)
  }
}

impl Validate for ExamplePage {
  fn validate(&self) -> Result<(), ValidationError> {
    self.data.iter().try_for_each(Validate::validate)
  }
}

impl<T: Validate> Validate for [T] {
  fn validate(&self) -> Result<(), ValidationError> {
    self.iter().try_for_each(Validate::validate)
  }
}

impl<T: Validate> Validate for Vec<T> {
  fn validate(&self) -> Result<(), ValidationError> {
    self.as_slice().validate()
  }
}
