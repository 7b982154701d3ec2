pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod room_manager;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower_http::services::ServeDir;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let web_root = config.web_root.clone();
    let state = AppState::new(config);

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(health::health_check))
        .route("/api/v1/rooms/{code}", get(api::get_room))
        .fallback_service(ServeDir::new(&web_root))
        .with_state(state.clone());

    (app, state)
}

/// Background task that drops rooms nobody has touched for `idle_timeout_secs`.
pub fn spawn_idle_room_cleanup(state: AppState) -> tokio::task::JoinHandle<()> {
    let max_idle = Duration::from_secs(state.config.rooms.idle_timeout_secs);
    let every = Duration::from_secs(state.config.rooms.idle_check_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let removed = state.rooms.write().await.cleanup_idle_rooms(max_idle);
            if removed > 0 {
                tracing::info!(removed, "Cleaned up idle rooms");
            }
        }
    })
}
