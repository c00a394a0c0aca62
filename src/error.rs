use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::upstream::INVALID_PARAMETER_CODE;

/// A failed API request, rendered as
/// `{error: true, code, message, details?, stack?}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i64,
    message: String,
    details: Option<String>,
    stack: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: bool,
    code: i64,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stack: Option<&'a [String]>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code: i64::from(status.as_u16()),
            message: message.into(),
            details: None,
            stack: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// The catalogue rejected an id as malformed or unknown.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMETER_CODE,
            ..Self::bad_request(message)
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_stack(mut self, err: &(dyn StdError + 'static)) -> Self {
        self.stack = Some(error_chain(err));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `err` followed by each of its sources.
pub fn error_chain(err: &(dyn StdError + 'static)) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }
    chain
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: true,
            code: self.code,
            message: &self.message,
            details: self.details.as_deref(),
            stack: self.stack.as_deref(),
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::UpstreamError;
    use axum::body::to_bytes;
    use serde_json::{Value, json};

    async fn body_of(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_renders_minimal_body() {
        let (status, body) = body_of(ApiError::not_found("Drama not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({"error": true, "code": 404, "message": "Drama not found"})
        );
    }

    #[tokio::test]
    async fn invalid_parameter_keeps_upstream_code() {
        let err = ApiError::invalid_parameter("Invalid video ID parameter")
            .with_details("The video ID format is incorrect or invalid");
        assert_eq!(err.code(), INVALID_PARAMETER_CODE);
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], json!(100001));
        assert_eq!(body["details"], json!("The video ID format is incorrect or invalid"));
    }

    #[tokio::test]
    async fn stack_lists_error_chain() {
        let upstream = UpstreamError::Timeout;
        let err = ApiError::internal("Failed to fetch video stream")
            .with_details(upstream.to_string())
            .with_stack(&upstream);
        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["stack"], json!(["upstream request timed out"]));
    }
}
