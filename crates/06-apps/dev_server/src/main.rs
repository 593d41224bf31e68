//! Local development server for the tracking agent.
//!
//! Serves the built agent bundle and demo page, accepts pageviews on the same
//! wire contract as the production ingestion endpoint, and lists what it
//! received on the dashboard API.

mod ingest;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue},
    Router,
};
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::ingest::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Pageview agent dev server")]
struct Args {
    /// Directory holding the demo page and the wasm-pack output
    #[arg(long, default_value = "web/dist")]
    dist: PathBuf,

    /// Address to bind (ip or host)
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Number of received pageviews kept for the dashboard API
    #[arg(long, default_value_t = 500)]
    retain: usize,
}

impl Args {
    fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let addr = args.bind_addr()?;
    if !args.dist.is_dir() {
        warn!(
            "{} is not a directory; only the ingestion routes will answer",
            args.dist.display()
        );
    }

    let app = build_app(AppState::new(args.retain), &args.dist);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind listener on {addr}"))?;

    info!(
        "collecting pageviews on http://{addr}/view (demo from {}, retaining {})",
        args.dist.display(),
        args.retain
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dev_server=debug,tower_http=info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

async fn shutdown_signal() {
    if signal::ctrl_c().await.is_ok() {
        warn!("received Ctrl+C, shutting down");
    }
}

fn build_app(state: AppState, dist: &Path) -> Router {
    let assets = ServeDir::new(dist).append_index_html_on_directories(true);

    // The agent posts from third-party pages; let them read our responses.
    let headers = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .into_inner();

    ingest::routes(state).fallback_service(assets).layer(headers)
}
