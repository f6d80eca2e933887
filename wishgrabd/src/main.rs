mod api;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use wishgrab_core::browser::SessionManager;
use wishgrab_core::wishlist::WishlistScraper;
use wishgrab_core::{load_config, WishgrabConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Wishlist scraping daemon", long_about = None)]
struct Cli {
    /// Path to wishgrab.toml; compiled-in defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the [server] bind address
    #[arg(long)]
    bind: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => WishgrabConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }

    let session = Arc::new(SessionManager::new(
        config.chromium.clone(),
        config.identity.clone(),
    ));
    let scraper = Arc::new(WishlistScraper::new(Arc::clone(&session), config.clone())?);

    let app = api::router(scraper);
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "wishgrabd listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The shared browser must be torn down before the process exits.
    session.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
