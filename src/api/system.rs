//! Health probes, cache administration and the `/api` fallback.

use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;

use super::AppState;
use crate::{
    cache::CacheStats,
    enrich::iso_timestamp,
    error::{ApiError, ApiResult},
};

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    total_items: usize,
}

#[derive(Debug, Serialize)]
pub struct ApiHealth {
    status: &'static str,
    timestamp: String,
    uptime: f64,
    cache_stats: CacheSummary,
    environment: &'static str,
}

pub async fn api_health(State(state): State<AppState>) -> Json<ApiHealth> {
    Json(ApiHealth {
        status: "OK",
        timestamp: iso_timestamp(Utc::now()),
        uptime: state.started_at.elapsed().as_secs_f64(),
        cache_stats: CacheSummary {
            total_items: state.cache.len(),
        },
        environment: state.settings.environment.as_str(),
    })
}

#[derive(Debug, Serialize)]
pub struct ServerHealth {
    status: &'static str,
    timestamp: String,
    environment: &'static str,
    port: u16,
}

pub async fn health(State(state): State<AppState>) -> Json<ServerHealth> {
    Json(ServerHealth {
        status: "OK",
        timestamp: iso_timestamp(Utc::now()),
        environment: state.settings.environment.as_str(),
        port: state.settings.port,
    })
}

fn development_only(state: &AppState, refusal: &str) -> ApiResult<()> {
    if state.settings.is_development() {
        Ok(())
    } else {
        Err(ApiError::forbidden(refusal))
    }
}

pub async fn cache_stats(State(state): State<AppState>) -> ApiResult<Json<CacheStats>> {
    development_only(&state, "Cache stats not available in production")?;
    Ok(Json(state.cache.stats()))
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    success: bool,
    message: String,
    timestamp: String,
}

pub async fn clear_cache(State(state): State<AppState>) -> ApiResult<Json<Cleared>> {
    development_only(&state, "Cache clearing not allowed in production")?;
    let removed = state.cache.clear();
    tracing::info!(removed, "cache cleared");
    Ok(Json(Cleared {
        success: true,
        message: format!("Cache cleared ({removed} items removed)"),
        timestamp: iso_timestamp(Utc::now()),
    }))
}

#[derive(Debug, Serialize)]
pub struct KeyCleared {
    success: bool,
    deleted: bool,
    key: String,
    message: &'static str,
}

pub async fn clear_cache_key(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<KeyCleared>> {
    development_only(&state, "Cache clearing not allowed in production")?;
    let deleted = state.cache.remove(&key);
    Ok(Json(KeyCleared {
        success: true,
        deleted,
        message: if deleted {
            "Cache key cleared"
        } else {
            "Cache key not found"
        },
        key,
    }))
}

#[derive(Debug, Serialize)]
struct UnknownEndpoint {
    error: bool,
    code: u16,
    message: &'static str,
    path: String,
    method: String,
    timestamp: String,
}

pub async fn api_not_found(method: Method, OriginalUri(uri): OriginalUri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(UnknownEndpoint {
            error: true,
            code: StatusCode::NOT_FOUND.as_u16(),
            message: "API endpoint not found",
            path: uri.path().to_string(),
            method: method.to_string(),
            timestamp: iso_timestamp(Utc::now()),
        }),
    )
}
