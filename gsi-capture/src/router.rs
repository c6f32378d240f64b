use std::future::ready;
use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post};
use axum::Router;
use health::HealthRegistry;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::EventCache;
use crate::endpoints;
use crate::ingest::Pipeline;
use crate::prometheus::{setup_metrics_recorder, track_metrics};
use crate::store::EventStore;

#[derive(Clone)]
pub struct GsiState {
    pub pipeline: Arc<Pipeline>,
}

#[derive(Clone)]
pub struct QueryState {
    pub cache: EventCache,
    pub store: Arc<dyn EventStore>,
}

async fn index() -> &'static str {
    "gsi-capture"
}

/// Listener the game client posts its snapshots to.
pub fn gsi_router(pipeline: Arc<Pipeline>, liveness: HealthRegistry) -> Router {
    Router::new()
        .route("/", post(endpoints::snapshot))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(GsiState { pipeline })
}

/// Read side: durable store queries and the hot cache.
pub fn query_router(
    cache: EventCache,
    store: Arc<dyn EventStore>,
    liveness: HealthRegistry,
    metrics: bool,
) -> Router {
    let state = QueryState { cache, store };

    // Dashboards are served from other origins
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
        .allow_origin(AllowOrigin::mirror_request());

    let router = Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(move || ready(liveness.get_status())))
        .route("/db/player-events", get(endpoints::db_player_events))
        .route("/db/kill-events", get(endpoints::db_kill_events))
        .route("/redis/player-events", get(endpoints::cached_player_events))
        .route("/redis/kill-events", get(endpoints::cached_kill_events))
        .route("/redis/cache-size", get(endpoints::cache_size))
        .route("/redis/clear", delete(endpoints::cache_clear))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // The recorder is global, tests build routers without it
    if metrics {
        let recorder_handle = setup_metrics_recorder();
        router.route("/metrics", get(move || ready(recorder_handle.render())))
    } else {
        router
    }
}
