use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable selecting the API base URL.
pub const BASE_URL_ENV: &str = "API_BASE_URL";

/// Base URL used when neither the environment nor the config file set one.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiConfig {
  /// API base URL (overridden by API_BASE_URL)
  pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file for persisted client state
  /// (default: $XDG_DATA_HOME/examples-client/storage.db)
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./examples-client.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/examples-client/config.yaml
  ///
  /// Unlike an explicit path, a missing file in the search locations is not
  /// an error: every setting has a default.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("examples-client.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("examples-client").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolve the API base URL.
  ///
  /// Checks API_BASE_URL first, then the config file, then falls back to
  /// `http://localhost:3000/`.
  pub fn base_url(&self) -> String {
    self.base_url_with(std::env::var(BASE_URL_ENV).ok())
  }

  fn base_url_with(&self, env_value: Option<String>) -> String {
    env_value
      .filter(|v| !v.trim().is_empty())
      .or_else(|| self.api.base_url.clone())
      .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
  }
}
