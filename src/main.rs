//! lanbox server binary.
//!
//! A password-protected file server for the local network: browse and sort
//! directories, download with range support, upload through multipart forms,
//! and switch the shared root at runtime through `/set_root`.

mod admin;
mod app;
mod atomic;
mod auth;
mod background;
mod config;
mod device;
mod error;
mod etag;
mod files;
mod html;
mod http;
mod listing;
mod logging;
mod multipart;
mod network;
mod root;
mod storage;
mod upload;

use anyhow::{Context, bail};
use axum_server::Handle;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

use crate::auth::AuthGate;
use crate::background::spawn_background_tasks;
use crate::config::{ADMIN_ROUTE, Args, ServerConfig};
use crate::root::{RootStore, locate_startup_root};

/// Starts the lanbox server and blocks until shutdown.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();

    let args = Args::parse();
    let config = ServerConfig::load(&args.config)
        .await
        .with_context(|| format!("cannot load configuration {}", args.config.display()))?;
    let port = args.port.unwrap_or(config.server.port);

    let Some(root_dir) = locate_startup_root(&config.server.directory).await else {
        bail!(
            "no usable shared directory for {:?}, check server.directory in {}",
            config.server.directory,
            args.config.display()
        );
    };

    let gate = Arc::new(AuthGate::new(
        config.auth.username.clone(),
        config.auth.password.clone(),
        Duration::from_secs(args.auth_window_secs),
        args.auth_max_failures,
    ));
    let username = config.auth.username.clone();
    let root = Arc::new(RootStore::new(
        root_dir.clone(),
        config,
        args.config.clone(),
    ));
    let app = app::build_router(root, gate.clone());

    let host = args
        .bind
        .parse::<IpAddr>()
        .with_context(|| format!("invalid bind address {}", args.bind))?;
    let addr = SocketAddr::new(host, port);
    let handle = Handle::new();

    let lan_url = format!("http://{}:{port}", network::local_ip().await);
    info!("✅ URL: http://localhost:{port} ({lan_url})");
    info!("📂 Shared path: {}", root_dir.display());
    info!("🔐 User: {username}");
    info!("⚙️ Change root: {lan_url}{ADMIN_ROUTE}");
    if !args.no_qr {
        match network::render_qr(&lan_url) {
            Ok(qr) => info!("📸 QR code:\n{qr}"),
            Err(err) => warn!(error = %err, "cannot render qr code"),
        }
    }

    let server = axum_server::bind(addr)
        .handle(handle.clone())
        .serve(app.into_make_service_with_connect_info::<SocketAddr>());

    let sweeper = spawn_background_tasks(gate);
    tokio::select! {
        result = server => result.with_context(|| format!("cannot serve on {addr}"))?,
        _ = shutdown_signal(handle) => {}
    }
    sweeper.abort();

    Ok(())
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received termination signal shutting down");
    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
