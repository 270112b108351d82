//! tessera-bridge server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the chat webhook together with the
//! admin API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for an identity's password:
//!
//! ```
//! cargo run -p tessera-bridge --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use clap::Parser;
use rand_core::OsRng;
use tessera_bridge::{
  AppState, ServerConfig, dispatch::NoTools, sender::HttpSender,
  session::SessionMap,
};
use tessera_core::store::DirectoryStore;
use tessera_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// How long past expiry a row keeps its login material before the
/// background sweep clears it. Expiry itself is enforced lazily at use.
const CODE_GRACE_MINUTES: i64 = 30;

#[derive(Parser)]
#[command(author, version, about = "Tessera chat bridge and admin API server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = rpassword_or_stdin()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TESSERA"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let sender =
    HttpSender::new(&server_cfg.chat_api_base, &server_cfg.chat_token)
      .context("failed to build chat sender")?;

  // Build application state.
  let state = AppState {
    store:    store.clone(),
    sender:   Arc::new(sender),
    tools:    Arc::new(NoTools),
    sessions: Arc::new(SessionMap::new()),
    config:   Arc::new(server_cfg.clone()),
  };

  spawn_code_sweeper(store.clone());

  let app = tessera_bridge::router(state)
    .nest("/api", tessera_api::api_router(store))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Background janitor that clears login material from rows whose code
/// window lapsed more than [`CODE_GRACE_MINUTES`] ago.
fn spawn_code_sweeper(store: Arc<SqliteStore>) {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(Duration::from_secs(60));
    loop {
      ticker.tick().await;
      let cutoff = Utc::now() - chrono::Duration::minutes(CODE_GRACE_MINUTES);
      match store.expire_stale_codes(cutoff).await {
        Ok(0) => {}
        Ok(rows) => tracing::info!(rows, "cleared stale login codes"),
        Err(e) => tracing::warn!(error = %e, "stale-code sweep failed"),
      }
    }
  });
}

/// Read a password from stdin (no echo).
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
