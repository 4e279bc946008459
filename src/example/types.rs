use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The example entity as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Example {
  pub id: u64,
  pub name: String,
  pub description: String,
  pub count: f64,
  pub created_at: String,
  pub updated_at: String,
}

/// Create parameters: the entity minus server-assigned fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExampleParams {
  pub name: String,
  pub description: String,
  pub count: f64,
}

impl CreateExampleParams {
  /// Build the entity the server would return for these parameters.
  pub fn into_example(self, id: u64, timestamp: &str) -> Example {
    Example {
      id,
      name: self.name,
      description: self.description,
      count: self.count,
      created_at: timestamp.to_string(),
      updated_at: timestamp.to_string(),
    }
  }
}

impl From<&Example> for CreateExampleParams {
  fn from(example: &Example) -> Self {
    Self {
      name: example.name.clone(),
      description: example.description.clone(),
      count: example.count,
    }
  }
}

/// Update parameters: required id, every create field optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateExampleParams {
  pub id: u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub count: Option<f64>,
}

impl UpdateExampleParams {
  pub fn new(id: u64) -> Self {
    Self {
      id,
      name: None,
      description: None,
      count: None,
    }
  }

  /// Merge the present fields over `example`. Timestamps are left alone.
  pub fn apply_to(&self, example: &Example) -> Example {
    Example {
      id: example.id,
      name: self.name.clone().unwrap_or_else(|| example.name.clone()),
      description: self
        .description
        .clone()
        .unwrap_or_else(|| example.description.clone()),
      count: self.count.unwrap_or(example.count),
      created_at: example.created_at.clone(),
      updated_at: example.updated_at.clone(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetExampleParams {
  pub id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteExampleParams {
  pub id: u64,
}

/// Column to sort list results by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
  #[default]
  Id,
  Name,
  CreatedAt,
  UpdatedAt,
}

impl SortBy {
  pub fn as_str(self) -> &'static str {
    match self {
      SortBy::Id => "id",
      SortBy::Name => "name",
      SortBy::CreatedAt => "createdAt",
      SortBy::UpdatedAt => "updatedAt",
    }
  }
}

impl fmt::Display for SortBy {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortBy {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "id" => Ok(SortBy::Id),
      "name" => Ok(SortBy::Name),
      "createdAt" => Ok(SortBy::CreatedAt),
      "updatedAt" => Ok(SortBy::UpdatedAt),
      other => Err(format!(
        "unknown sort column '{}' (expected id, name, createdAt or updatedAt)",
        other
      )),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  Asc,
  #[default]
  Desc,
}

impl SortOrder {
  pub fn as_str(self) -> &'static str {
    match self {
      SortOrder::Asc => "asc",
      SortOrder::Desc => "desc",
    }
  }
}

impl fmt::Display for SortOrder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SortOrder {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "asc" => Ok(SortOrder::Asc),
      "desc" => Ok(SortOrder::Desc),
      other => Err(format!("unknown sort order '{}' (expected asc or desc)", other)),
    }
  }
}

fn default_page() -> u32 {
  1
}

fn default_limit() -> u32 {
  10
}

/// Pagination, search and sort parameters for the list endpoint.
///
/// Absent fields take their defaults both in code (`Default`) and when
/// deserialized from partial input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListExampleParams {
  #[serde(default = "default_page")]
  pub page: u32,
  #[serde(default = "default_limit")]
  pub limit: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub search: Option<String>,
  #[serde(default)]
  pub sort_by: SortBy,
  #[serde(default)]
  pub sort_order: SortOrder,
}

impl Default for ListExampleParams {
  fn default() -> Self {
    Self {
      page: default_page(),
      limit: default_limit(),
      search: None,
      sort_by: SortBy::default(),
      sort_order: SortOrder::default(),
    }
  }
}

/// One page of list results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamplePage {
  pub data: Vec<Example>,
  pub total: u64,
  pub page: u32,
  pub limit: u32,
}

/// Body returned by the delete endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
  pub success: bool,
  pub message: String,
}

/// Current time in the canonical timestamp format
/// (`2024-05-01T12:00:00.000Z`).
pub fn now_timestamp() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
