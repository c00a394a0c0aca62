//! Client for the third-party drama catalogue.
//!
//! Handlers talk to the catalogue through the [`Upstream`] trait so the router
//! can be driven by an in-memory fake in tests. [`HttpUpstream`] is the real
//! implementation backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue, REFERER, USER_AGENT},
};
use serde_json::Value;
use thiserror::Error;

/// Upstream code for a malformed or unknown book/video id.
pub const INVALID_PARAMETER_CODE: i64 = 100001;

const CLIENT_USER_AGENT: &str = "DramaChina-App/1.0";
const CLIENT_REFERER: &str = "https://dramachina.com/";

/// One GET request against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Latest,
    Trending,
    Search {
        query: String,
        limit: u32,
        offset: u32,
    },
    Detail {
        book_id: String,
    },
    Stream {
        video_id: String,
    },
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Latest => "/latest",
            Endpoint::Trending => "/trending",
            Endpoint::Search { .. } => "/search",
            Endpoint::Detail { .. } => "/detail",
            Endpoint::Stream { .. } => "/stream",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::Latest | Endpoint::Trending => Vec::new(),
            Endpoint::Search {
                query,
                limit,
                offset,
            } => vec![
                ("query", query.clone()),
                ("limit", limit.to_string()),
                ("offset", offset.to_string()),
            ],
            Endpoint::Detail { book_id } => vec![("bookId", book_id.clone())],
            Endpoint::Stream { video_id } => vec![("videoId", video_id.clone())],
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out")]
    Timeout,
    #[error("upstream request failed")]
    Transport(#[source] reqwest::Error),
    #[error("upstream responded with HTTP {status}{}", message_suffix(.message))]
    Rejected {
        status: u16,
        code: Option<i64>,
        message: Option<String>,
    },
    #[error("upstream returned an unreadable body")]
    Decode(#[source] serde_json::Error),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

impl UpstreamError {
    /// Error code reported inside the upstream's own error body, if any.
    pub fn upstream_code(&self) -> Option<i64> {
        match self {
            UpstreamError::Rejected { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_invalid_parameter(&self) -> bool {
        self.upstream_code() == Some(INVALID_PARAMETER_CODE)
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else {
            UpstreamError::Transport(err)
        }
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Value, UpstreamError>;
}

/// `reqwest`-backed catalogue client with a fixed per-call timeout.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: Client,
    base_url: String,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(REFERER, HeaderValue::from_static(CLIENT_REFERER));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch(&self, endpoint: &Endpoint) -> Result<Value, UpstreamError> {
        let url = self.url_for(endpoint);
        let response = self
            .client
            .get(&url)
            .query(&endpoint.query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The catalogue explains rejections in a JSON body; keep its code.
            let body: Option<Value> = response.json().await.ok();
            let code = body
                .as_ref()
                .and_then(|body| body.get("code"))
                .and_then(Value::as_i64);
            let message = body
                .as_ref()
                .and_then(|body| body.get("message"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            tracing::error!(%url, status = status.as_u16(), ?code, "upstream rejected request");
            return Err(UpstreamError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(UpstreamError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_chain;

    #[test]
    fn endpoints_map_to_catalogue_paths() {
        let search = Endpoint::Search {
            query: "love story".into(),
            limit: 20,
            offset: 40,
        };
        assert_eq!(search.path(), "/search");
        assert_eq!(
            search.query(),
            vec![
                ("query", "love story".to_string()),
                ("limit", "20".to_string()),
                ("offset", "40".to_string()),
            ]
        );
        assert_eq!(
            Endpoint::Stream {
                video_id: "7312345678901".into()
            }
            .query(),
            vec![("videoId", "7312345678901".to_string())]
        );
        assert!(Endpoint::Trending.query().is_empty());
    }

    #[test]
    fn base_url_trailing_slash_is_ignored() {
        let client = HttpUpstream::new("https://up.example/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.url_for(&Endpoint::Latest),
            "https://up.example/api/latest"
        );
    }

    #[test]
    fn invalid_parameter_is_detected_from_rejection_code() {
        let err = UpstreamError::Rejected {
            status: 400,
            code: Some(INVALID_PARAMETER_CODE),
            message: Some("invalid param".into()),
        };
        assert!(err.is_invalid_parameter());
        assert_eq!(err.to_string(), "upstream responded with HTTP 400: invalid param");
        assert!(!UpstreamError::Timeout.is_invalid_parameter());
    }

    #[tokio::test]
    async fn transport_failures_keep_their_cause() {
        let client = HttpUpstream::new("not a url", Duration::from_secs(1)).unwrap();
        let err = client.fetch(&Endpoint::Latest).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Transport(_)));
        let chain = error_chain(&err);
        assert_eq!(chain[0], "upstream request failed");
        assert!(chain.len() >= 2, "cause chain was lost: {chain:?}");
    }

    #[test]
    fn unreadable_bodies_keep_the_parse_error() {
        let parse = serde_json::from_slice::<Value>(b"<html>").unwrap_err();
        let chain = error_chain(&UpstreamError::Decode(parse));
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0], "upstream returned an unreadable body");
    }
}
