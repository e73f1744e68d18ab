//! doc-hub server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_hub::api::{self, AppState};
use doc_hub_core::auth::{DenyAll, Hs256Verifier, TokenVerifier};
use doc_hub_core::identity::{MemoryFavorites, StaticTeams};
use doc_hub_core::{DocumentService, DocumentStore, ServiceConfig, TreeStore};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "doc-hub")]
#[command(about = "Hierarchical document access service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:3000")]
        addr: String,

        /// Directory holding the tree file; in-memory when omitted
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env()?;

    match cli.command {
        Commands::Serve { addr, data_dir } => serve(&addr, data_dir, config).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Token verifier from `DOC_HUB_JWT_SECRET`, and whether a secret was set.
fn load_verifier() -> (Arc<dyn TokenVerifier>, bool) {
    match std::env::var("DOC_HUB_JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => (Arc::new(Hs256Verifier::new(secret)), true),
        _ => {
            warn!("DOC_HUB_JWT_SECRET not set, bearer tokens will be rejected");
            (Arc::new(DenyAll), false)
        }
    }
}

async fn serve(addr: &str, data_dir: Option<PathBuf>, config: ServiceConfig) -> Result<()> {
    let store: Arc<dyn TreeStore> = match data_dir {
        Some(dir) => {
            let store = DocumentStore::open(dir.clone())
                .with_context(|| format!("failed to open store in {}", dir.display()))?;
            info!(documents = store.len().await, dir = %dir.display(), "store loaded");
            Arc::new(store)
        }
        None => {
            info!("using in-memory store");
            Arc::new(DocumentStore::in_memory())
        }
    };

    let (verifier, has_secret) = load_verifier();
    let header_identity = config.allow_header_identity && !has_secret;
    if config.allow_header_identity && has_secret {
        warn!("X-User-Id identity disabled because a token secret is configured");
    } else if header_identity {
        warn!("trusting X-User-Id headers as caller identity");
    }

    let state = AppState {
        service: DocumentService::new(store, Arc::new(MemoryFavorites::new()), config),
        verifier,
        teams: Arc::new(StaticTeams::new()),
        header_identity,
    };
    let app = api::router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
