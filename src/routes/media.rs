use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::AppResult;
use crate::state::AppState;

/// Serve an uploaded post image from the media store.
pub async fn serve(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    match state.media.load(&path).await? {
        Some(data) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                    (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
                ],
                data,
            )
                .into_response())
        }
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}
