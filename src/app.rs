use clap::{Args, Subcommand};
use color_eyre::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use examples_client::cache::QueryClient;
use examples_client::config::Config;
use examples_client::example::{
  CachedExampleClient, CreateExampleParams, DeleteExampleParams, ExampleClient, ListExampleParams,
  SortBy, SortOrder, UpdateExampleParams,
};
use examples_client::http::HttpClient;
use examples_client::navigation::{Location, LOGIN_PATH};
use examples_client::storage::{SqliteStorage, Storage, TOKEN_KEY};

/// CLI operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
  /// List examples; any paging flag switches to the paginated endpoint
  List(ListArgs),
  /// Show one example
  Get { id: u64 },
  /// Create an example
  Create {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value_t = 0.0)]
    count: f64,
  },
  /// Update the given fields of an example
  Update {
    id: u64,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    count: Option<f64>,
  },
  /// Delete an example
  Delete { id: u64 },
  /// Store the bearer token sent with every request
  Login { token: String },
  /// Forget the stored token
  Logout,
}

#[derive(Args, Debug, Clone, Default, PartialEq)]
pub struct ListArgs {
  #[arg(long)]
  page: Option<u32>,
  #[arg(long)]
  limit: Option<u32>,
  #[arg(long)]
  search: Option<String>,
  /// id, name, createdAt or updatedAt
  #[arg(long)]
  sort_by: Option<SortBy>,
  /// asc or desc
  #[arg(long)]
  sort_order: Option<SortOrder>,
}

impl ListArgs {
  /// Paging parameters, or `None` when the full list was asked for.
  fn params(&self) -> Option<ListExampleParams> {
    if *self == Self::default() {
      return None;
    }
    let defaults = ListExampleParams::default();
    Some(ListExampleParams {
      page: self.page.unwrap_or(defaults.page),
      limit: self.limit.unwrap_or(defaults.limit),
      search: self.search.clone(),
      sort_by: self.sort_by.unwrap_or(defaults.sort_by),
      sort_order: self.sort_order.unwrap_or(defaults.sort_order),
    })
  }
}

/// Wires storage, navigation, HTTP and the query cache together and runs
/// one command against them.
pub struct App {
  storage: Arc<dyn Storage>,
  location: Arc<Location>,
  examples: CachedExampleClient,
  optimistic: bool,
}

impl App {
  pub fn new(config: &Config, optimistic: bool) -> Result<Self> {
    let storage = SqliteStorage::open(config.storage.path.as_deref())?;
    Self::with_storage(&config.base_url(), Arc::new(storage), optimistic)
  }

  pub fn with_storage(base_url: &str, storage: Arc<dyn Storage>, optimistic: bool) -> Result<Self> {
    let location = Arc::new(Location::default());
    let http = HttpClient::new(base_url, storage.clone(), location.clone())?;
    info!(base_url = %http.base_url(), "client ready");

    let examples = CachedExampleClient::new(ExampleClient::new(http), QueryClient::new());
    Ok(Self {
      storage,
      location,
      examples,
      optimistic,
    })
  }

  /// Run `command` and return the result to print.
  pub async fn run(&self, command: Command) -> Result<Value> {
    let result = self.dispatch(command).await;
    if self.location.href() == LOGIN_PATH {
      warn!("session expired, log in again with `login <token>`");
    }
    result
  }

  async fn dispatch(&self, command: Command) -> Result<Value> {
    let value = match command {
      Command::List(args) => match args.params() {
        Some(params) => json!(self.examples.list_examples_page(params).await?.data),
        None => json!(self.examples.list_examples().await?.data),
      },
      Command::Get { id } => {
        let example = self.examples.get_example(Some(id)).await?;
        json!(example.map(|result| result.data))
      }
      Command::Create {
        name,
        description,
        count,
      } => {
        let params = CreateExampleParams {
          name,
          description,
          count,
        };
        if self.optimistic {
          json!(self.examples.create_example_optimistic(params).await?)
        } else {
          json!(self.examples.create_example(params).await?)
        }
      }
      Command::Update {
        id,
        name,
        description,
        count,
      } => {
        let params = UpdateExampleParams {
          id,
          name,
          description,
          count,
        };
        if self.optimistic {
          json!(self.examples.update_example_optimistic(params).await?)
        } else {
          json!(self.examples.update_example(params).await?)
        }
      }
      Command::Delete { id } => {
        json!(self.examples.delete_example(DeleteExampleParams { id }).await?)
      }
      Command::Login { token } => {
        self.storage.set_item(TOKEN_KEY, &token)?;
        json!({"success": true, "message": "token stored"})
      }
      Command::Logout => {
        self.storage.remove_item(TOKEN_KEY)?;
        json!({"success": true, "message": "token removed"})
      }
    };
    Ok(value)
  }
}
