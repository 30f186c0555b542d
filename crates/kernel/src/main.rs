//! HashBrown Kernel
//!
//! HTTP server and user administration for the HashBrown headless CMS.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hashbrown_kernel::{AppState, Config, build_router};

#[derive(Parser)]
#[command(name = "hashbrown", version, about = "HashBrown headless CMS server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Create a user and print its API token.
    CreateUser {
        username: String,

        /// Grant project and user management rights.
        #[arg(long)]
        admin: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;

    let state = AppState::new(&config)
        .await
        .context("failed to initialize application state")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state, &config).await,
        Command::CreateUser { username, admin } => {
            let (user, token) = state.users().create(&username, admin).await?;
            info!(user = %user.id, "user created");
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(state: AppState, config: &Config) -> Result<()> {
    info!(
        port = config.port,
        store = state.store().backend(),
        processors = ?state.registry().processor_aliases(),
        deployers = ?state.registry().deployer_aliases(),
        "Starting HashBrown kernel"
    );

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
