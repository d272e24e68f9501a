use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use bazaar::config::Config;
use bazaar::db::{AppState, queries};
use bazaar::handlers;

#[derive(Parser)]
#[command(name = "bazaar", about = "Marketplace subscription and entitlement service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve,
    /// Idempotently create the admin account and print its token once
    ProvisionAdmin {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Administrator")]
        full_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bazaar=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::ProvisionAdmin { email, full_name } => {
            provision_admin(&config, &email, &full_name)
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config)?;

    let cors = if config.dev_mode {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("Failed to bind {}", config.addr()))?;

    tracing::info!("bazaar listening on {}", config.addr());
    axum::serve(listener, app).await?;
    Ok(())
}

/// Explicit first-run admin seeding. Safe to run repeatedly: an existing
/// admin with the same email short-circuits without touching anything.
fn provision_admin(config: &Config, email: &str, full_name: &str) -> anyhow::Result<()> {
    let state = AppState::new(config)?;
    let conn = state.db.get()?;

    match queries::provision_admin(&conn, email, full_name)? {
        Some((account, api_token)) => {
            println!("Admin account created: {} ({})", account.email, account.id);
            println!("API token (shown once, store it now): {api_token}");
        }
        None => println!("Admin already provisioned: {email}"),
    }
    Ok(())
}
