use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use netpong_server::config::ServerConfig;
use netpong_server::{build_app, spawn_idle_room_cleanup};

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("NETPONG_LOG_JSON").is_ok_and(|v| v == "1" || v == "true") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ServerConfig::load();
    config.validate();
    let listen_addr = config.listen_addr.clone();

    let (app, state) = build_app(config);
    spawn_idle_room_cleanup(state);

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        },
    };
    tracing::info!(addr = %listen_addr, "netpong server listening");

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down");
    })
    .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
