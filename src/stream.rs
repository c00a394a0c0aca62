//! Stream manifest processing.
//!
//! A `/stream` reply carries a `video_model` member: a JSON document encoded
//! as a string, whose `video_list` maps opaque keys to one descriptor per
//! quality tier. The catalogue obscures the `main_url` / `backup_url_1` of
//! those descriptors with base64. Encoded values are recognised by the
//! leading `aHR0c` that base64 produces for the literal `http`.
//!
//! The detection is a heuristic tied to the upstream format: a URL encoded
//! with a different alignment is left alone, and a plain string that happens
//! to start with the signature is only rewritten if it decodes to something
//! with a URI scheme. Nothing in this module ever fails a request; anything
//! that cannot be decoded or parsed is passed through as received.

use base64::{
    Engine as _,
    engine::{
        GeneralPurpose,
        general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE, URL_SAFE_NO_PAD},
    },
};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    enrich::{epoch_to_iso, format_duration},
    model::{lenient_f64, lenient_i64, lenient_i64_value, lenient_string, truthy},
};

/// What base64 turns a leading `http` into.
pub const ENCODED_HTTP_PREFIX: &str = "aHR0c";

const DESCRIPTOR_URL_FIELDS: [&str; 2] = ["main_url", "backup_url_1"];
const PAYLOAD_URL_FIELDS: [&str; 2] = ["main_url", "backup_url"];
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

const ENGINES: [&GeneralPurpose; 4] = [&STANDARD, &STANDARD_NO_PAD, &URL_SAFE, &URL_SAFE_NO_PAD];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("stream payload has no video_model")]
    Missing,
    #[error("video_model is not a string")]
    NotAString,
    #[error("video_model is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decodes an obscured URL. Returns `None` when `raw` does not carry the
/// encoded signature or does not decode to a UTF-8 URL.
pub fn decode_url(raw: &str) -> Option<String> {
    let candidate = raw.trim();
    if !candidate.starts_with(ENCODED_HTTP_PREFIX) {
        return None;
    }
    let bytes = ENGINES
        .iter()
        .find_map(|engine| engine.decode(candidate).ok())?;
    let text = String::from_utf8(bytes).ok()?;
    has_scheme(&text).then_some(text)
}

/// A URL fit to hand to a client: decoded if it was obscured, untouched if it
/// already carries a scheme, `None` otherwise.
pub fn usable_url(raw: &str) -> Option<String> {
    if raw.trim().starts_with(ENCODED_HTTP_PREFIX) {
        return decode_url(raw);
    }
    has_scheme(raw).then(|| raw.trim().to_owned())
}

fn has_scheme(text: &str) -> bool {
    let Some((scheme, rest)) = text.split_once("://") else {
        return false;
    };
    !rest.is_empty()
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn decode_fields_in_place(object: &mut Map<String, Value>, fields: &[&str]) {
    for field in fields {
        let Some(raw) = object.get(*field).and_then(Value::as_str) else {
            continue;
        };
        if !raw.trim().starts_with(ENCODED_HTTP_PREFIX) {
            continue;
        }
        match decode_url(raw) {
            Some(url) => {
                object.insert((*field).to_owned(), Value::String(url));
            }
            None => tracing::warn!(field, "could not decode obscured URL, leaving it as received"),
        }
    }
}

/// Returns a copy of a stream payload whose URLs are decoded, with the
/// normalised model written back into `video_model`. Decoding an already
/// plain payload is a no-op.
pub fn process_stream_data(data: &Value) -> Value {
    let mut processed = data.clone();
    let Some(object) = processed.as_object_mut() else {
        return processed;
    };

    decode_fields_in_place(object, &PAYLOAD_URL_FIELDS);

    let Some(raw_model) = object.get("video_model").and_then(Value::as_str) else {
        return processed;
    };
    let mut model: Value = match serde_json::from_str(raw_model) {
        Ok(model) => model,
        Err(err) => {
            tracing::warn!(error = %err, "video_model is not valid JSON, passing it through");
            return processed;
        }
    };

    let Some(video_list) = model.get_mut("video_list").and_then(Value::as_object_mut) else {
        return processed;
    };
    for descriptor in video_list.values_mut() {
        if let Some(descriptor) = descriptor.as_object_mut() {
            decode_fields_in_place(descriptor, &DESCRIPTOR_URL_FIELDS);
        }
    }

    match serde_json::to_string(&model) {
        Ok(encoded) => {
            object.insert("video_model".to_owned(), Value::String(encoded));
        }
        Err(err) => tracing::warn!(error = %err, "failed to re-encode video_model"),
    }
    processed
}

/// The parsed `video_model` of a stream payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoModel {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub video_duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub poster_url: Option<String>,
    #[serde(default)]
    has_embedded_subtitle: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub auto_definition: Option<String>,
    #[serde(default)]
    pub video_list: Option<Map<String, Value>>,
}

impl VideoModel {
    pub fn has_embedded_subtitle(&self) -> bool {
        self.has_embedded_subtitle.as_ref().is_some_and(truthy)
    }

    /// Descriptors that could be projected, keyed by their opaque upstream key.
    pub fn descriptors(&self) -> Vec<(&str, QualityDescriptor)> {
        let Some(list) = &self.video_list else {
            return Vec::new();
        };
        list.iter()
            .filter_map(|(key, raw)| match serde_json::from_value(raw.clone()) {
                Ok(descriptor) => Some((key.as_str(), descriptor)),
                Err(err) => {
                    tracing::debug!(key, error = %err, "skipping malformed quality descriptor");
                    None
                }
            })
            .collect()
    }
}

pub fn parse_video_model(data: &Value) -> Result<VideoModel, ManifestError> {
    let raw = data.get("video_model").ok_or(ManifestError::Missing)?;
    let raw = raw.as_str().ok_or(ManifestError::NotAString)?;
    Ok(serde_json::from_str(raw)?)
}

/// One raw entry of `video_list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QualityDescriptor {
    #[serde(default, deserialize_with = "lenient_string")]
    pub definition: Option<String>,
    #[serde(default)]
    pub quality: Option<Value>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vwidth: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub vheight: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub bitrate: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub size: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub main_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub backup_url_1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub codec_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub fps: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub url_expire: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub file_hash: Option<String>,
}

impl QualityDescriptor {
    fn label(&self, key: &str) -> String {
        match self.definition.as_deref().map(str::trim) {
            Some(definition) if !definition.is_empty() => definition.to_owned(),
            _ => key.to_owned(),
        }
    }
}

/// One playable quality tier. Field names on the wire follow what the player
/// reads (`vwidth`, `size`, `codec_type`, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualityOption {
    pub definition: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<Value>,
    #[serde(rename = "vwidth")]
    pub width: i64,
    #[serde(rename = "vheight")]
    pub height: i64,
    pub bitrate: i64,
    #[serde(rename = "size")]
    pub size_bytes: i64,
    pub size_mb: String,
    pub main_url: String,
    pub backup_url: Option<String>,
    #[serde(rename = "codec_type")]
    pub codec: String,
    pub fps: i64,
    #[serde(rename = "url_expire")]
    pub url_expire_epoch: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_hash: Option<String>,
}

/// Tiers in the order the catalogue listed them. A label seen twice keeps its
/// first position and the later tier's values.
pub type QualityOptions = IndexMap<String, QualityOption>;

fn size_mb(bytes: i64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

/// Builds the quality mapping of a stream payload, keyed by human label.
/// Missing or malformed manifests yield an empty mapping; a tier whose main
/// URL cannot be made usable is left out.
pub fn extract_quality_options(data: &Value) -> QualityOptions {
    let model = match parse_video_model(data) {
        Ok(model) => model,
        Err(ManifestError::Missing) => return QualityOptions::new(),
        Err(err) => {
            tracing::warn!(error = %err, "cannot extract quality options");
            return QualityOptions::new();
        }
    };

    let mut options = QualityOptions::new();
    for (key, descriptor) in model.descriptors() {
        let Some(main_url) = descriptor.main_url.as_deref().and_then(usable_url) else {
            tracing::warn!(key, "quality tier has no usable main URL, skipping it");
            continue;
        };
        let size_bytes = descriptor.size.unwrap_or(0);
        let option = QualityOption {
            definition: descriptor.label(key),
            quality: descriptor.quality.clone(),
            width: descriptor.vwidth.unwrap_or(0),
            height: descriptor.vheight.unwrap_or(0),
            bitrate: descriptor.bitrate.unwrap_or(0),
            size_bytes,
            size_mb: size_mb(size_bytes),
            main_url,
            backup_url: descriptor.backup_url_1.as_deref().and_then(usable_url),
            codec: descriptor.codec_type.clone().unwrap_or_default(),
            fps: descriptor.fps.unwrap_or(0),
            url_expire_epoch: descriptor.url_expire,
            file_hash: descriptor.file_hash.clone(),
        };
        options.insert(option.definition.clone(), option);
    }
    options
}

#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Summary of one tier as listed by the playback endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct QualitySummary {
    pub id: String,
    pub definition: Option<String>,
    pub quality: Option<Value>,
    pub resolution: String,
    pub bitrate: Option<i64>,
    pub size_bytes: Option<i64>,
    pub size_mb: String,
    pub codec: Option<String>,
    pub fps: Option<i64>,
    pub url_expire: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaybackInfo {
    pub video_id: String,
    pub stream_available: bool,
    pub expires_at: Option<String>,
    pub expires_in_seconds: Option<i64>,
    pub video_resolution: Resolution,
    pub main_url: Option<String>,
    pub backup_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_embedded_subtitle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_qualities: Option<Vec<QualitySummary>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_quality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_model_error: Option<String>,
}

/// A top-level URL of a stream payload, decoded when it is obscured.
pub fn surface_url(data: &Value, field: &str) -> Option<String> {
    let raw = data.get(field)?.as_str()?;
    Some(decode_url(raw).unwrap_or_else(|| raw.to_owned()))
}

/// Playback details of a successful stream payload. A broken manifest only
/// costs the model-derived fields and is reported in `video_model_error`.
pub fn playback_info(video_id: &str, data: &Value, now: DateTime<Utc>) -> PlaybackInfo {
    let expire_time = data.get("expire_time").and_then(lenient_i64_value);
    let mut info = PlaybackInfo {
        video_id: video_id.to_owned(),
        stream_available: true,
        expires_at: expire_time.and_then(epoch_to_iso),
        expires_in_seconds: expire_time.map(|expires| expires.saturating_sub(now.timestamp())),
        video_resolution: Resolution {
            width: data.get("video_width").and_then(lenient_i64_value),
            height: data.get("video_height").and_then(lenient_i64_value),
        },
        main_url: surface_url(data, "main_url"),
        backup_url: surface_url(data, "backup_url"),
        video_duration: None,
        poster_url: None,
        has_embedded_subtitle: None,
        available_qualities: None,
        recommended_quality: None,
        video_duration_formatted: None,
        video_model_error: None,
    };

    let model = match parse_video_model(data) {
        Ok(model) => model,
        Err(ManifestError::Missing) => return info,
        Err(err) => {
            tracing::warn!(video_id, error = %err, "failed to parse video model");
            info.video_model_error = Some(err.to_string());
            return info;
        }
    };

    info.video_duration = model.video_duration;
    info.poster_url = model.poster_url.clone();
    info.has_embedded_subtitle = Some(model.has_embedded_subtitle());

    if model.video_list.is_some() {
        let qualities = model
            .descriptors()
            .into_iter()
            .map(|(key, descriptor)| QualitySummary {
                id: key.to_owned(),
                resolution: format!(
                    "{}x{}",
                    descriptor.vwidth.unwrap_or(0),
                    descriptor.vheight.unwrap_or(0)
                ),
                size_mb: size_mb(descriptor.size.unwrap_or(0)),
                url_expire: descriptor.url_expire.and_then(epoch_to_iso),
                definition: descriptor.definition,
                quality: descriptor.quality,
                bitrate: descriptor.bitrate,
                size_bytes: descriptor.size,
                codec: descriptor.codec_type,
                fps: descriptor.fps,
            })
            .collect();
        info.available_qualities = Some(qualities);
        info.recommended_quality = model.auto_definition.clone();
        info.video_duration_formatted =
            Some(format_duration(model.video_duration.unwrap_or(0.0) as i64));
    }

    info
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubtitleTrack {
    pub id: &'static str,
    pub language: &'static str,
    pub language_code: &'static str,
    pub url: Option<String>,
    pub format: &'static str,
    pub is_default: bool,
    pub is_embedded: bool,
}

/// Subtitles are burned into the catalogue's videos; these tracks only tell
/// the player which languages to advertise.
pub fn placeholder_subtitles(has_embedded_subtitle: bool) -> Vec<SubtitleTrack> {
    if !has_embedded_subtitle {
        return Vec::new();
    }
    vec![
        SubtitleTrack {
            id: "id",
            language: "Bahasa Indonesia",
            language_code: "id",
            url: None,
            format: "vtt",
            is_default: true,
            is_embedded: true,
        },
        SubtitleTrack {
            id: "en",
            language: "English",
            language_code: "en",
            url: None,
            format: "vtt",
            is_default: false,
            is_embedded: true,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const URL_720: &str = "https://v16.cdn.example/video/720/abc.mp4?expire=1700000000";
    const URL_BACKUP: &str = "https://v19.cdn.example/video/720/abc.mp4";

    fn encode(url: &str) -> String {
        STANDARD.encode(url)
    }

    fn payload_with(video_list: Value) -> Value {
        let model = json!({
            "video_duration": 125.4,
            "poster_url": "https://img.example/poster.jpg",
            "has_embedded_subtitle": true,
            "auto_definition": "720p",
            "video_list": video_list,
        });
        json!({
            "main_url": URL_720,
            "backup_url": URL_BACKUP,
            "video_width": 720,
            "video_height": 1280,
            "expire_time": 1_700_003_600,
            "video_model": model.to_string(),
        })
    }

    fn model_urls(processed: &Value) -> Vec<(String, Value, Value)> {
        let model: Value =
            serde_json::from_str(processed["video_model"].as_str().unwrap()).unwrap();
        model["video_list"]
            .as_object()
            .unwrap()
            .iter()
            .map(|(key, d)| (key.clone(), d["main_url"].clone(), d["backup_url_1"].clone()))
            .collect()
    }

    #[test]
    fn decode_url_reverses_base64() {
        assert_eq!(decode_url(&encode(URL_720)).as_deref(), Some(URL_720));
        let unpadded = encode("http://a.b/cd").trim_end_matches('=').to_owned();
        assert_eq!(decode_url(&unpadded).as_deref(), Some("http://a.b/cd"));
    }

    #[test]
    fn decode_url_ignores_plain_and_garbage_values() {
        assert_eq!(decode_url(URL_720), None);
        assert_eq!(decode_url(""), None);
        assert_eq!(decode_url("aHR0c!!!not base64"), None);
        // "http" followed by 0xFF
        assert_eq!(decode_url("aHR0cP8="), None);
    }

    #[test]
    fn usable_url_rejects_schemeless_values() {
        assert_eq!(usable_url(URL_720).as_deref(), Some(URL_720));
        assert_eq!(usable_url("//cdn.example/x.mp4"), None);
        assert_eq!(usable_url("not a url"), None);
    }

    #[test]
    fn process_decodes_descriptor_urls() {
        let payload = payload_with(json!({
            "video_1": {"definition": "720p", "main_url": encode(URL_720), "backup_url_1": encode(URL_BACKUP)},
            "video_2": {"definition": "480p", "main_url": URL_720, "backup_url_1": ""}
        }));
        let processed = process_stream_data(&payload);
        let urls = model_urls(&processed);

        assert_eq!(urls[0], ("video_1".into(), json!(URL_720), json!(URL_BACKUP)));
        assert_eq!(urls[1], ("video_2".into(), json!(URL_720), json!("")));
        assert_eq!(processed["video_width"], json!(720));
    }

    #[test]
    fn process_is_idempotent() {
        let payload = payload_with(json!({
            "video_1": {"definition": "720p", "main_url": encode(URL_720)}
        }));
        let once = process_stream_data(&payload);
        let twice = process_stream_data(&once);
        assert_eq!(model_urls(&once), model_urls(&twice));
        assert_eq!(once, twice);
    }

    #[test]
    fn process_keeps_undecodable_fields_and_continues() {
        let payload = payload_with(json!({
            "video_1": {"main_url": "aHR0c%%%broken", "backup_url_1": encode(URL_BACKUP)}
        }));
        let urls = model_urls(&process_stream_data(&payload));
        assert_eq!(urls[0].1, json!("aHR0c%%%broken"));
        assert_eq!(urls[0].2, json!(URL_BACKUP));
    }

    #[test]
    fn process_passes_malformed_model_through() {
        let payload = json!({"main_url": encode(URL_720), "video_model": "{not json"});
        let processed = process_stream_data(&payload);
        assert_eq!(processed["video_model"], json!("{not json"));
        assert_eq!(processed["main_url"], json!(URL_720));
    }

    #[test]
    fn extract_keys_options_by_definition_with_decoded_urls() {
        let payload = payload_with(json!({
            "video_1": {
                "definition": "720p", "quality": "normal", "vwidth": 720, "vheight": 1280,
                "bitrate": 1_500_000, "size": 10_485_760, "codec_type": "h264", "fps": 30,
                "main_url": encode(URL_720), "backup_url_1": encode(URL_BACKUP),
                "url_expire": 1_700_000_000, "file_hash": "abc"
            },
            "video_2": {"definition": "1080p", "main_url": encode("https://cdn.example/1080.mp4")}
        }));
        let options = extract_quality_options(&payload);

        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["720p", "1080p"]);
        let hd = &options["720p"];
        assert_eq!(hd.main_url, URL_720);
        assert_eq!(hd.backup_url.as_deref(), Some(URL_BACKUP));
        assert_eq!(hd.size_mb, "10.00");
        assert_eq!((hd.width, hd.height, hd.fps), (720, 1280, 30));
        assert_eq!(options["1080p"].backup_url, None);
        assert_eq!(options["1080p"].codec, "");

        let wire = serde_json::to_value(hd).unwrap();
        assert_eq!(wire["vwidth"], json!(720));
        assert_eq!(wire["codec_type"], json!("h264"));
        assert_eq!(wire["url_expire"], json!(1_700_000_000));
    }

    #[test]
    fn tiers_follow_catalogue_order_and_later_duplicates_win() {
        let payload = payload_with(json!({
            "video_2": {"definition": "720p", "main_url": encode("https://cdn.example/first.mp4")},
            "video_10": {"definition": "720p", "main_url": encode("https://cdn.example/second.mp4")},
            "video_3": {"definition": "240p", "main_url": encode("https://cdn.example/low.mp4")}
        }));

        let options = extract_quality_options(&payload);
        assert_eq!(options.keys().collect::<Vec<_>>(), vec!["720p", "240p"]);
        assert_eq!(options["720p"].main_url, "https://cdn.example/second.mp4");

        let info = playback_info("7312345678901", &payload, Utc::now());
        let ids: Vec<_> = info
            .available_qualities
            .unwrap()
            .into_iter()
            .map(|quality| quality.id)
            .collect();
        assert_eq!(ids, vec!["video_2", "video_10", "video_3"]);

        let keys: Vec<_> = model_urls(&process_stream_data(&payload))
            .into_iter()
            .map(|(key, _, _)| key)
            .collect();
        assert_eq!(keys, vec!["video_2", "video_10", "video_3"]);
    }

    #[test]
    fn extract_skips_tiers_without_a_usable_url() {
        let payload = payload_with(json!({
            "a": {"definition": "360p", "main_url": "aHR0c%%%"},
            "b": {"definition": "540p"},
            "c": "not an object",
            "d": {"main_url": URL_720}
        }));
        let options = extract_quality_options(&payload);
        assert_eq!(options.len(), 1);
        assert_eq!(options["d"].definition, "d");
    }

    #[test]
    fn extract_tolerates_missing_or_broken_manifest() {
        assert!(extract_quality_options(&json!({})).is_empty());
        assert!(extract_quality_options(&json!({"video_model": "[1,"})).is_empty());
        assert!(extract_quality_options(&json!({"video_model": 7})).is_empty());
        assert!(extract_quality_options(&json!({"video_model": "{}"})).is_empty());
    }

    #[test]
    fn playback_info_summarises_manifest() {
        let payload = payload_with(json!({
            "video_1": {"definition": "720p", "vwidth": 720, "vheight": 1280, "size": 2_097_152,
                        "url_expire": 1_700_000_000, "main_url": encode(URL_720)}
        }));
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let info = playback_info("7312345678901", &payload, now);

        assert!(info.stream_available);
        assert_eq!(info.expires_in_seconds, Some(3600));
        assert_eq!(info.expires_at.as_deref(), Some("2023-11-14T23:13:20.000Z"));
        assert_eq!(info.main_url.as_deref(), Some(URL_720));
        assert_eq!(info.video_resolution.height, Some(1280));
        assert_eq!(info.recommended_quality.as_deref(), Some("720p"));
        assert_eq!(info.video_duration_formatted.as_deref(), Some("2:05"));
        assert_eq!(info.has_embedded_subtitle, Some(true));
        let qualities = info.available_qualities.unwrap();
        assert_eq!(qualities[0].resolution, "720x1280");
        assert_eq!(qualities[0].size_mb, "2.00");
        assert_eq!(qualities[0].url_expire.as_deref(), Some("2023-11-14T22:13:20.000Z"));
    }

    #[test]
    fn extreme_expire_time_does_not_overflow() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let info = playback_info("7312345678901", &json!({"expire_time": -1e30}), now);
        assert_eq!(info.expires_in_seconds, Some(i64::MIN));
        assert_eq!(info.expires_at, None);

        let info = playback_info("7312345678901", &json!({"expire_time": 1e30}), now);
        assert_eq!(info.expires_in_seconds, Some(i64::MAX - 1_700_000_000));
    }

    #[test]
    fn playback_info_reports_model_errors() {
        let payload = json!({"main_url": URL_720, "video_model": "{oops"});
        let info = playback_info("1", &payload, Utc::now());
        assert!(info.video_model_error.is_some());
        assert!(info.available_qualities.is_none());
        assert_eq!(info.expires_at, None);
    }

    #[test]
    fn subtitles_only_when_embedded() {
        assert!(placeholder_subtitles(false).is_empty());
        let tracks = placeholder_subtitles(true);
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].is_default);
        assert_eq!(tracks[1].language_code, "en");
    }
}
