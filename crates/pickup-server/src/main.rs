//! pickup-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store, and serves the pickup REST API over HTTP.
//!
//! # Bootstrapping an administrator
//!
//! ```sh
//! echo 'a-long-password' | pickup-server create-admin --name "Head" --email head@school.test
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use pickup_api::{AppState, ServerConfig, auth::hash_password, render::QrSvgRenderer};
use pickup_core::{
  Error as CoreError, directory,
  guardian::{NewGuardian, Role},
};
use pickup_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "School pickup API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
  /// Create an administrator account. The password is read from stdin.
  CreateAdmin {
    #[arg(long)]
    name:  String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: Option<String>,
  },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("PICKUP"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if let Some(Command::CreateAdmin { name, email, phone }) = cli.command {
    return create_admin(&store, name, email, phone).await;
  }

  let state = AppState {
    store:    Arc::new(store),
    renderer: Arc::new(QrSvgRenderer),
    config:   Arc::new(server_cfg.clone()),
  };

  let app = pickup_api::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn create_admin(
  store: &SqliteStore,
  name: String,
  email: String,
  phone: Option<String>,
) -> anyhow::Result<()> {
  let password = rpassword_or_stdin()?;
  let password_hash = hash_password(&password).context("unusable password")?;

  let admin = directory::create_admin(store, NewGuardian {
    name,
    email,
    phone,
    role: Role::Admin,
    photo: None,
    password_hash,
    children: Vec::new(),
  })
  .await;

  match admin {
    Ok(admin) => {
      tracing::info!(id = %admin.guardian_id, email = %admin.email, "administrator created");
      println!("{}", admin.guardian_id);
      Ok(())
    }
    Err(CoreError::Conflict(_)) => anyhow::bail!("an account with this email already exists"),
    Err(e) => Err(e).context("failed to create administrator"),
  }
}

/// Read a password from stdin.
fn rpassword_or_stdin() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
