mod app;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use examples_client::config::Config;

#[derive(Parser, Debug)]
#[command(name = "examples-client")]
#[command(about = "Command-line client for the examples REST API")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/examples-client/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Write to the cache before the server answers, rolling back on failure
  #[arg(long, global = true)]
  optimistic: bool,

  #[command(subcommand)]
  command: app::Command,
}

/// Log to stderr so stdout stays pure JSON. Filter with RUST_LOG.
fn init_logging() -> Result<WorkerGuard> {
  let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(writer))
    .try_init()
    .map_err(|e| eyre!("Failed to install tracing subscriber: {}", e))?;

  Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _guard = init_logging()?;

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;

  let app = app::App::new(&config, args.optimistic)?;
  let output = app.run(args.command).await?;

  let rendered =
    serde_json::to_string_pretty(&output).map_err(|e| eyre!("Failed to render output: {}", e))?;
  println!("{}", rendered);

  Ok(())
}
