use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotResponseCode {
    Ok,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SnapshotResponse {
    pub status: SnapshotResponseCode,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSizeResponse {
    pub size: usize,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheClearResponse {
    pub deleted: u64,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("failed to parse snapshot: {0}")]
    RequestParsingError(#[from] serde_json::Error),

    #[error("store query failed: {0}")]
    StoreError(#[from] StoreError),

    #[error("cache request failed: {0}")]
    CacheError(#[from] CacheError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RequestParsingError(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::StoreError(_) | ApiError::CacheError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        }
        .into_response()
    }
}
