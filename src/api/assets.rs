//! Static files of the browser player, served from the public directory.

use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    extract::State,
    http::{Uri, header},
    response::{IntoResponse, Redirect, Response},
};
use mime_guess::MimeGuess;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::AppState;
use crate::error::{ApiError, ApiResult};

const INDEX_FILE: &str = "index.html";

pub async fn index(State(state): State<AppState>) -> ApiResult<Response> {
    stream_file(state.settings.public_dir.join(INDEX_FILE)).await
}

pub async fn redirect_home() -> Redirect {
    Redirect::to("/")
}

pub async fn static_file(State(state): State<AppState>, uri: Uri) -> ApiResult<Response> {
    let relative =
        sanitize_path(uri.path()).ok_or_else(|| ApiError::not_found("file not found"))?;
    let mut path = state.settings.public_dir.join(relative);
    if tokio::fs::metadata(&path)
        .await
        .is_ok_and(|metadata| metadata.is_dir())
    {
        path.push(INDEX_FILE);
    }
    stream_file(path).await
}

/// Maps a request path onto a relative file path, refusing anything that
/// could leave the public directory.
fn sanitize_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in request_path.split('/').filter(|segment| !segment.is_empty()) {
        if segment.contains('\\') {
            return None;
        }
        match Path::new(segment).components().next() {
            Some(Component::Normal(part)) => relative.push(part),
            _ => return None,
        }
    }
    Some(relative)
}

async fn stream_file(path: PathBuf) -> ApiResult<Response> {
    let file = File::open(&path)
        .await
        .map_err(|_| ApiError::not_found("file not found"))?;

    let guessed = MimeGuess::from_path(&path).first();
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);
    let mut response = body.into_response();
    if let Some(mime) = guessed {
        if let Ok(value) = mime.to_string().parse() {
            response.headers_mut().insert(header::CONTENT_TYPE, value);
        }
    }

    Ok(response)
}
