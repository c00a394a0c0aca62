//! HTTP surface: the `/api` routes, health probes and the static player UI.

use std::{sync::Arc, time::Instant};

use axum::{
    Json, Router,
    http::{HeaderName, HeaderValue},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::{
    cache::FetchCache,
    config::Settings,
    error::ApiError,
    upstream::{Endpoint, Upstream, UpstreamError},
};

pub mod assets;
pub mod catalog;
pub mod streams;
pub mod system;

/// Which freshness window a cached upstream document gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheClass {
    Listing,
    Stream,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<FetchCache>,
    pub upstream: Arc<dyn Upstream>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(settings: Settings, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            settings: Arc::new(settings),
            cache: Arc::new(FetchCache::new()),
            upstream,
            started_at: Instant::now(),
        }
    }

    /// Fetches `endpoint` through the shared cache under `key`.
    pub async fn fetch(
        &self,
        key: &str,
        class: CacheClass,
        endpoint: &Endpoint,
    ) -> Result<Arc<Value>, UpstreamError> {
        let max_age = match class {
            CacheClass::Listing => self.settings.cache_ttl,
            CacheClass::Stream => self.settings.stream_cache_ttl,
        };
        self.cache
            .get_or_fetch(key, max_age, || self.upstream.fetch(endpoint))
            .await
    }

    /// 500 for an upstream failure no cached copy could cover.
    pub fn upstream_failure(&self, message: &str, err: &UpstreamError) -> ApiError {
        tracing::error!(error = %err, "{message}");
        let api_error = ApiError::internal(message).with_details(err.to_string());
        if self.settings.is_development() {
            api_error.with_stack(err)
        } else {
            api_error
        }
    }

    /// Like [`AppState::upstream_failure`], but maps the catalogue's
    /// invalid-parameter rejection of `subject` (e.g. "video ID") to a 400.
    pub fn id_failure(&self, subject: &str, message: &str, err: &UpstreamError) -> ApiError {
        if err.is_invalid_parameter() {
            tracing::warn!(error = %err, "catalogue rejected {subject}");
            return ApiError::invalid_parameter(format!("Invalid {subject} parameter"))
                .with_details(format!("The {subject} format is incorrect or invalid"));
        }
        self.upstream_failure(message, err)
    }
}

/// `{code, message, data}` wrapper of every successful `/api` answer.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub code: i64,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(code: i64, message: impl Into<String>, data: T) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn success(data: T) -> Json<Self> {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Json<Self> {
        Json(Self::new(0, message, data))
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/latest", get(catalog::latest))
        .route("/trending", get(catalog::trending))
        .route("/search", get(catalog::search))
        .route("/detail/{id}", get(catalog::detail))
        .route("/episodes/{id}", get(catalog::episodes))
        .route("/episodes/{id}/{number}", get(catalog::episode))
        .route("/categories", get(catalog::categories))
        .route("/category/{name}", get(catalog::category))
        .route("/similar/{id}", get(catalog::similar))
        .route("/recommended", get(catalog::recommended))
        .route("/stream/{id}", get(streams::stream))
        .route("/stream/quality/{id}", get(streams::stream_quality))
        .route("/playback/{id}", get(streams::playback))
        .route("/validate/{id}", get(streams::validate))
        .route("/subtitles/{id}", get(streams::subtitles))
        .route("/batch/streams", post(streams::batch_streams))
        .route("/health", get(system::api_health))
        .route("/cache/stats", get(system::cache_stats))
        .route("/cache/clear", post(system::clear_cache))
        .route("/cache/clear/{key}", post(system::clear_cache_key))
        .fallback(system::api_not_found)
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .route("/health", get(system::health))
        .route("/", get(assets::index))
        .route("/home", get(assets::redirect_home))
        .route("/index", get(assets::redirect_home))
        .route("/index.html", get(assets::redirect_home))
        .fallback(assets::static_file)
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
