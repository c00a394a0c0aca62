//! Stream, playback and subtitle endpoints.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AppState, CacheClass, Envelope};
use crate::{
    enrich::{epoch_to_iso, iso_timestamp},
    error::{ApiError, ApiResult},
    model::{UpstreamReply, lenient_i64_value},
    stream::{
        PlaybackInfo, QualityOptions, SubtitleTrack, extract_quality_options, parse_video_model,
        placeholder_subtitles, playback_info, process_stream_data, surface_url,
    },
    upstream::{Endpoint, INVALID_PARAMETER_CODE, UpstreamError},
    video_id::{RejectionKind, clean_video_id, validate_video_id},
};

pub const MAX_BATCH_SIZE: usize = 10;
const AUTO_QUALITY: &str = "auto";

fn cleaned_video_id(raw: &str) -> ApiResult<String> {
    let id = clean_video_id(raw);
    if id.is_empty() {
        return Err(ApiError::bad_request("Video ID is required"));
    }
    Ok(id)
}

async fn load_stream(state: &AppState, video_id: &str) -> Result<Arc<Value>, UpstreamError> {
    state
        .fetch(
            &format!("stream:{video_id}"),
            CacheClass::Stream,
            &Endpoint::Stream {
                video_id: video_id.to_owned(),
            },
        )
        .await
}

pub async fn stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Value>>> {
    let id = cleaned_video_id(&id)?;
    let payload = load_stream(&state, &id)
        .await
        .map_err(|err| state.id_failure("video ID", "Failed to fetch video stream", &err))?;

    let reply = UpstreamReply::parse(&payload);
    let data = reply.success_data().ok_or_else(|| {
        ApiError::not_found("Video stream not found")
            .with_details(reply.failure_message("No stream data available"))
    })?;
    Ok(Envelope::success(process_stream_data(data)))
}

#[derive(Debug, Default, Deserialize)]
pub struct QualityQuery {
    quality: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QualityStream {
    #[serde(flatten)]
    stream: Map<String, Value>,
    quality_options: QualityOptions,
    selected_quality: String,
    available_qualities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selected_backup: Option<String>,
}

pub async fn stream_quality(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<QualityQuery>,
) -> ApiResult<Json<Envelope<QualityStream>>> {
    let id = cleaned_video_id(&id)?;
    let payload = load_stream(&state, &id).await.map_err(|err| {
        state.upstream_failure("Failed to fetch video stream with quality options", &err)
    })?;
    let data = UpstreamReply::parse(&payload)
        .success_data()
        .ok_or_else(|| ApiError::not_found("Video stream not found"))?;

    let selected_quality = query
        .quality
        .filter(|quality| !quality.is_empty())
        .unwrap_or_else(|| AUTO_QUALITY.to_string());
    let quality_options = extract_quality_options(data);
    let selected = (selected_quality != AUTO_QUALITY)
        .then(|| quality_options.get(&selected_quality))
        .flatten();

    let mut stream = match process_stream_data(data) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for derived in ["quality_options", "selected_quality", "available_qualities"] {
        stream.remove(derived);
    }

    Ok(Envelope::success(QualityStream {
        selected_url: selected.map(|option| option.main_url.clone()),
        selected_backup: selected.and_then(|option| option.backup_url.clone()),
        available_qualities: quality_options.keys().cloned().collect(),
        stream,
        quality_options,
        selected_quality,
    }))
}

#[derive(Debug, Serialize)]
struct UnavailablePlayback {
    video_id: String,
    stream_available: bool,
    error: String,
}

pub async fn playback(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = cleaned_video_id(&id)?;
    let payload = load_stream(&state, &id)
        .await
        .map_err(|err| state.upstream_failure("Failed to fetch playback information", &err))?;

    let reply = UpstreamReply::parse(&payload);
    match reply.success_data() {
        Some(data) => {
            let info: PlaybackInfo = playback_info(&id, data, Utc::now());
            Ok(Envelope::success(info).into_response())
        }
        None => {
            let body = Envelope::new(
                404,
                "Video stream not available",
                UnavailablePlayback {
                    video_id: id,
                    stream_available: false,
                    error: reply.failure_message("Unknown error"),
                },
            );
            Ok((StatusCode::NOT_FOUND, Json(body)).into_response())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Validation {
    valid: bool,
    video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason_code: Option<RejectionKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    suggestions: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation_timestamp: Option<String>,
}

impl Validation {
    fn rejected(
        video_id: String,
        reason: String,
        reason_code: Option<RejectionKind>,
        suggestions: Vec<&'static str>,
    ) -> Self {
        Self {
            valid: false,
            video_id,
            reason: Some(reason),
            reason_code,
            suggestions,
            format: None,
            length: None,
            validation_timestamp: None,
        }
    }
}

fn unknown_video(video_id: String) -> Json<Envelope<Validation>> {
    Json(Envelope::new(
        INVALID_PARAMETER_CODE,
        "Video ID not found",
        Validation::rejected(
            video_id,
            "The video ID does not exist or is not accessible".to_string(),
            None,
            vec![
                "Check if the video ID is correct",
                "Verify the video still exists",
                "Try a different video ID",
            ],
        ),
    ))
}

pub async fn validate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Validation>>> {
    let id = cleaned_video_id(&id)?;
    if let Err(rejection) = validate_video_id(&id) {
        return Ok(Json(Envelope::new(
            INVALID_PARAMETER_CODE,
            rejection.message,
            Validation::rejected(
                id,
                rejection.reason,
                Some(rejection.kind),
                rejection.suggestions,
            ),
        )));
    }

    let endpoint = Endpoint::Stream {
        video_id: id.clone(),
    };
    match state
        .fetch(&format!("validate:{id}"), CacheClass::Stream, &endpoint)
        .await
    {
        Ok(payload) if UpstreamReply::parse(&payload).code == Some(INVALID_PARAMETER_CODE) => {
            Ok(unknown_video(id))
        }
        Ok(_) => Ok(Envelope::with_message(
            "Video ID is valid",
            Validation {
                valid: true,
                length: Some(id.len()),
                video_id: id,
                reason: None,
                reason_code: None,
                suggestions: Vec::new(),
                format: Some("numeric"),
                validation_timestamp: Some(iso_timestamp(Utc::now())),
            },
        )),
        Err(err) if err.is_invalid_parameter() => Ok(unknown_video(id)),
        Err(err) => Err(state.upstream_failure("Failed to validate video ID", &err)),
    }
}

#[derive(Debug, Serialize)]
pub struct Subtitles {
    video_id: String,
    available: bool,
    has_embedded_subtitle: bool,
    subtitles: Vec<SubtitleTrack>,
    total: usize,
}

pub async fn subtitles(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Envelope<Subtitles>>> {
    let id = cleaned_video_id(&id)?;
    let payload = load_stream(&state, &id)
        .await
        .map_err(|err| state.upstream_failure("Failed to fetch subtitles", &err))?;

    let has_embedded_subtitle = match UpstreamReply::parse(&payload).success_data() {
        Some(data) => match parse_video_model(data) {
            Ok(model) => model.has_embedded_subtitle(),
            Err(err) => {
                tracing::warn!(video_id = %id, error = %err, "cannot inspect subtitles");
                false
            }
        },
        None => false,
    };
    let subtitles = placeholder_subtitles(has_embedded_subtitle);

    Ok(Envelope::success(Subtitles {
        video_id: id,
        available: !subtitles.is_empty(),
        has_embedded_subtitle,
        total: subtitles.len(),
        subtitles,
    }))
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Available {
        success: bool,
        stream_available: bool,
        main_url: Option<String>,
        backup_url: Option<String>,
        width: Option<i64>,
        height: Option<i64>,
        expires_at: Option<String>,
    },
    Failed {
        success: bool,
        error: String,
    },
}

impl BatchItem {
    fn from_stream(data: &Value) -> Self {
        BatchItem::Available {
            success: true,
            stream_available: true,
            main_url: surface_url(data, "main_url"),
            backup_url: surface_url(data, "backup_url"),
            width: data.get("video_width").and_then(lenient_i64_value),
            height: data.get("video_height").and_then(lenient_i64_value),
            expires_at: data
                .get("expire_time")
                .and_then(lenient_i64_value)
                .and_then(epoch_to_iso),
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        BatchItem::Failed {
            success: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchStreams {
    total_requested: usize,
    successful: usize,
    failed: usize,
    failed_ids: Vec<String>,
    streams: BTreeMap<String, BatchItem>,
    timestamp: String,
}

fn requested_id(value: &Value) -> String {
    match value {
        Value::String(id) => id.clone(),
        other => other.to_string(),
    }
}

pub async fn batch_streams(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<Json<Envelope<BatchStreams>>> {
    let requested: Vec<String> = match body.get("videoIds").and_then(Value::as_array) {
        Some(ids) if !ids.is_empty() => ids.iter().map(requested_id).collect(),
        _ => return Err(ApiError::bad_request("Array of video IDs is required")),
    };
    if requested.len() > MAX_BATCH_SIZE {
        return Err(ApiError::bad_request(format!(
            "Maximum {MAX_BATCH_SIZE} video IDs allowed per request"
        )));
    }

    let lookups = requested.iter().map(|raw| {
        let state = &state;
        async move {
            let id = clean_video_id(raw);
            match load_stream(state, &id).await {
                Ok(payload) => {
                    let reply = UpstreamReply::parse(&payload);
                    match reply.success_data() {
                        Some(data) => (id, Ok(BatchItem::from_stream(data))),
                        None => (raw.clone(), Err(reply.failure_message("Unknown error"))),
                    }
                }
                Err(err) => {
                    tracing::warn!(video_id = %id, error = %err, "batch stream lookup failed");
                    (raw.clone(), Err(err.to_string()))
                }
            }
        }
    });

    let mut streams = BTreeMap::new();
    let mut failed_ids = Vec::new();
    for (key, outcome) in join_all(lookups).await {
        match outcome {
            Ok(item) => {
                streams.insert(key, item);
            }
            Err(error) => {
                failed_ids.push(key.clone());
                streams.insert(key, BatchItem::failed(error));
            }
        }
    }

    Ok(Envelope::with_message(
        "Batch stream results",
        BatchStreams {
            total_requested: requested.len(),
            successful: requested.len() - failed_ids.len(),
            failed: failed_ids.len(),
            failed_ids,
            streams,
            timestamp: iso_timestamp(Utc::now()),
        },
    ))
}
