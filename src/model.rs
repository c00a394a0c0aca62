//! Typed views of the catalogue's JSON documents.
//!
//! Upstream payloads are untyped and loosely formatted: ids arrive as strings
//! or numbers, counters are sometimes strings, and individual list items can be
//! malformed. Everything here projects a `serde_json::Value` into a typed record
//! before any derived field is computed. Fields we do not interpret are kept in
//! `extra` and passed through to clients untouched. Items missing a required id
//! are dropped instead of failing the whole list.

use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// `{code, message, data}` as returned by the search, detail and stream
/// endpoints. The listing endpoints return bare `{books}` objects instead.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamReply<'a> {
    pub code: Option<i64>,
    pub message: Option<&'a str>,
    pub data: Option<&'a Value>,
}

impl<'a> UpstreamReply<'a> {
    pub fn parse(payload: &'a Value) -> Self {
        Self {
            code: payload.get("code").and_then(lenient_i64_value),
            message: payload.get("message").and_then(Value::as_str),
            data: payload.get("data").filter(|data| !data.is_null()),
        }
    }

    /// The `data` member when the catalogue reported success.
    pub fn success_data(&self) -> Option<&'a Value> {
        if self.code == Some(0) { self.data } else { None }
    }

    pub fn failure_message(&self, fallback: &str) -> String {
        self.message.unwrap_or(fallback).to_owned()
    }
}

/// One drama as it appears in listings and search results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    #[serde(deserialize_with = "id_string")]
    pub book_id: String,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub stat_infos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_hot: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Book {
    pub fn is_hot(&self) -> bool {
        match &self.is_hot {
            Some(Value::String(flag)) => flag == "1",
            Some(Value::Number(flag)) => flag.as_i64() == Some(1),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        }
    }
}

/// Books of a `/latest` or `/trending` payload.
pub fn listing_books(payload: &Value) -> Option<Vec<Book>> {
    payload
        .get("books")
        .and_then(Value::as_array)
        .map(|items| project_all::<Book>(items))
}

/// Books of a `/search` payload, flattened across every `search_data` group
/// in upstream order. `None` when the catalogue did not report success.
pub fn search_books(payload: &Value) -> Option<Vec<Book>> {
    let groups = UpstreamReply::parse(payload)
        .success_data()?
        .get("search_data")?
        .as_array()?;
    Some(
        groups
            .iter()
            .filter_map(|group| group.get("books").and_then(Value::as_array))
            .flat_map(|books| project_all::<Book>(books))
            .collect(),
    )
}

/// Payload of `/detail`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DramaDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_data: Option<SeriesData>,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Vec::is_empty")]
    pub stat_infos: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesData {
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub series_cover: Option<String>,
    #[serde(default, deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub series_intro: Option<String>,
    /// JSON-encoded list of `{category_id, name, schema}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_schema: Option<Value>,
    #[serde(default, deserialize_with = "episode_list")]
    pub video_list: Vec<Episode>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub episode_cnt: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub followed_cnt: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub series_play_cnt: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub series_status: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SeriesData {
    pub fn episode(&self, number: i64) -> Option<&Episode> {
        self.video_list
            .iter()
            .find(|episode| episode.vid_index == Some(number))
    }

    /// Looks up a nested member of a pass-through field, e.g.
    /// `("share_info", "share_cnt")`.
    pub fn nested(&self, field: &str, member: &str) -> Option<&Value> {
        self.extra.get(field)?.get(member)
    }
}

/// `None` when the payload is not a successful detail reply or cannot be
/// projected.
pub fn drama_detail(payload: &Value) -> Option<DramaDetail> {
    let data = UpstreamReply::parse(payload).success_data()?;
    match serde_json::from_value(data.clone()) {
        Ok(detail) => Some(detail),
        Err(err) => {
            tracing::warn!(error = %err, "detail payload did not match the expected shape");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    #[serde(deserialize_with = "id_string")]
    pub vid: String,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub vid_index: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub digged_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer_info: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn project_all<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed upstream item");
                None
            }
        })
        .collect()
}

/// JavaScript-style truthiness, used for flags the catalogue encodes loosely.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub fn lenient_i64_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.trim().parse::<f64>().ok().map(|float| float as i64),
        _ => None,
    }
}

pub fn lenient_f64_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(id) if !id.trim().is_empty() => Ok(id.trim().to_owned()),
        Value::Number(id) => Ok(id.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or numeric id, found {other}"
        ))),
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

pub(crate) fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(lenient_i64_value))
}

pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(lenient_f64_value))
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn episode_list<'de, D>(deserializer: D) -> Result<Vec<Episode>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => project_all(&items),
        _ => Vec::new(),
    })
}
