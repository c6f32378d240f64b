use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::{error, instrument};

use crate::api::{
    ApiError, CacheClearResponse, CacheSizeResponse, SnapshotResponse, SnapshotResponseCode,
};
use crate::events::{KillEvent, KillEventRow, PlayerEvent, PlayerEventRow};
use crate::query::{EventQueryConfig, EventQueryParams, KillEventQueryConfig, KillEventQueryParams};
use crate::router::{GsiState, QueryState};
use crate::snapshot::Snapshot;

/// Webhook target of the game client. Any JSON body is acknowledged,
/// snapshots missing a section are skipped by the pipeline.
#[instrument(skip_all, fields(body_size = body.len()))]
pub async fn snapshot(
    State(state): State<GsiState>,
    body: Bytes,
) -> Result<Json<SnapshotResponse>, ApiError> {
    let snapshot: Snapshot = serde_json::from_slice(&body).map_err(|e| {
        error!("failed to decode snapshot: {}", e);
        e
    })?;
    state.pipeline.ingest(&snapshot).await;

    Ok(Json(SnapshotResponse {
        status: SnapshotResponseCode::Ok,
    }))
}

pub async fn db_player_events(
    State(state): State<QueryState>,
    Query(params): Query<EventQueryParams>,
) -> Result<Json<Vec<PlayerEventRow>>, ApiError> {
    let filter = EventQueryConfig::from(&params);
    Ok(Json(state.store.player_events(&filter).await?))
}

pub async fn db_kill_events(
    State(state): State<QueryState>,
    Query(params): Query<KillEventQueryParams>,
) -> Result<Json<Vec<KillEventRow>>, ApiError> {
    let filter = KillEventQueryConfig::from(&params);
    Ok(Json(state.store.kill_events(&filter).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CacheParams {
    pub steamid: Option<String>,
}

impl CacheParams {
    fn steamid(&self) -> Option<&str> {
        self.steamid.as_deref().filter(|s| !s.is_empty())
    }
}

pub async fn cached_player_events(
    State(state): State<QueryState>,
    Query(params): Query<CacheParams>,
) -> Result<Json<Vec<PlayerEvent>>, ApiError> {
    Ok(Json(state.cache.list(params.steamid()).await?))
}

pub async fn cached_kill_events(
    State(state): State<QueryState>,
    Query(params): Query<CacheParams>,
) -> Result<Json<Vec<KillEvent>>, ApiError> {
    Ok(Json(state.cache.list(params.steamid()).await?))
}

pub async fn cache_size(State(state): State<QueryState>) -> Result<Json<CacheSizeResponse>, ApiError> {
    Ok(Json(CacheSizeResponse {
        size: state.cache.size().await?,
    }))
}

pub async fn cache_clear(
    State(state): State<QueryState>,
) -> Result<Json<CacheClearResponse>, ApiError> {
    let deleted = state.cache.clear().await?;
    tracing::info!("cleared {} cached events", deleted);
    Ok(Json(CacheClearResponse { deleted }))
}
