//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::State,
    http::{header, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::game::combat::CombatMode;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(state.config.client_origin.as_deref()))
        .with_state(state)
}

/// CORS for the configured origins (comma-separated), or any origin when unset
fn cors_layer(client_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    match client_origin {
        Some(origins) => {
            let allowed_origins: Vec<header::HeaderValue> = origins
                .split(',')
                .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
                .collect();
            cors.allow_origin(allowed_origins)
        }
        None => cors.allow_origin(Any),
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    mode: CombatMode,
    tick: u64,
    sessions: usize,
    players: usize,
    alive_players: usize,
    enemies: usize,
    projectiles: usize,
    drops: usize,
    buffered_intents: usize,
    dropped_intents: u64,
    rejected_requests: u64,
    protocol_errors: u64,
    avg_snapshot_bytes: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.engine.stats();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        mode: state.config.game.mode,
        tick: stats.tick,
        sessions: state.sessions.len(),
        players: stats.players,
        alive_players: stats.alive_players,
        enemies: stats.enemies,
        projectiles: stats.projectiles,
        drops: stats.drops,
        buffered_intents: stats.buffered_intents,
        dropped_intents: stats.dropped_intents,
        rejected_requests: stats.rejected_requests,
        protocol_errors: stats.protocol_errors,
        avg_snapshot_bytes: stats.avg_snapshot_bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::game::{GameConfig, GameEngine};

    fn state() -> AppState {
        let game = GameConfig::default();
        let (_engine, handle) = GameEngine::new(game.clone());
        let config = Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "info".into(),
            client_origin: None,
            session_queue: 8,
            game,
        };
        AppState::new(config, handle)
    }

    #[tokio::test]
    async fn health_reports_engine_counters() {
        let state = state();
        state.engine.record_protocol_error();
        state.open_session(uuid::Uuid::new_v4(), "127.0.0.1:9000".parse().unwrap());

        let Json(health) = health_handler(State(state)).await;

        assert_eq!(health.status, "ok");
        assert_eq!(health.mode, CombatMode::Orbit);
        assert_eq!(health.sessions, 1);
        assert_eq!(health.protocol_errors, 1);
        assert_eq!(health.tick, 0);
    }

    #[test]
    fn router_builds_with_origin_list() {
        let mut state = state();
        let mut config = (*state.config).clone();
        config.client_origin = Some("http://localhost:5173, https://example.com".into());
        state.config = std::sync::Arc::new(config);
        let _router = build_router(state);
    }
}
