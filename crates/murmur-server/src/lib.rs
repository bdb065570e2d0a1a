pub mod config;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use murmur_api::auth::{AppState, AppStateInner};
use murmur_db::Database;
use murmur_relay::{RelayContext, RelayHub, RelayTiming, RoomDirectory, handle_connection};

/// The REST state and the relay context, sharing one store.
#[derive(Clone)]
pub struct Services {
    pub api: AppState,
    pub relay: RelayContext,
}

impl Services {
    pub fn new(db: Database, jwt_secret: String, token_ttl: chrono::Duration) -> Self {
        let db = Arc::new(db);
        let directory: Arc<dyn RoomDirectory> = db.clone();
        let relay = RelayContext {
            hub: RelayHub::new(),
            directory,
            jwt_secret: Arc::from(jwt_secret.as_str()),
            timing: RelayTiming::default(),
        };
        let api = Arc::new(AppStateInner {
            db,
            jwt_secret,
            token_ttl,
        });
        Self { api, relay }
    }
}

/// REST routes, the relay socket and `/health`, with CORS and access logging.
pub fn app(services: &Services, cors_origins: &[String]) -> anyhow::Result<Router> {
    let relay_route = Router::new()
        .route("/relay", get(relay_upgrade))
        .with_state(services.relay.clone());

    let app = Router::new()
        .route("/health", get(health))
        .merge(murmur_api::routes(services.api.clone()))
        .merge(relay_route)
        .layer(cors_layer(cors_origins)?)
        .layer(TraceLayer::new_for_http());

    Ok(app)
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    if origins.is_empty() {
        return Ok(CorsLayer::permissive());
    }
    let origins = origins
        .iter()
        .map(|o| o.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "murmur" }))
}

async fn relay_upgrade(State(ctx): State<RelayContext>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, ctx))
}
