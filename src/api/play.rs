use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use tower_http::services::ServeFile;

use super::{ApiError, AppState};

/// GET /play/{filename}
/// Streams a track by its on-disk name, honoring Range requests so
/// browsers can seek. Links are shareable without a session.
pub async fn play_track(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // Stored names are flat tokens; anything path-like is hostile.
    if filename.contains('/') || filename.contains('\\') || filename.contains("..") {
        return Err(ApiError::NotFound("Track not found".to_string()));
    }

    let track = state
        .store()
        .get_track_by_stored_name(&filename)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("Track not found".to_string()))?;

    let path = state.library().track_path(&track.stored_name).await;
    if !path.exists() {
        return Err(ApiError::NotFound("Audio file missing on disk".to_string()));
    }

    metrics::counter!("track_plays_total").increment(1);

    let range_header = headers
        .get("range")
        .cloned()
        .unwrap_or_else(|| axum::http::HeaderValue::from_static("bytes=0-"));

    let req = axum::http::Request::builder()
        .header("range", range_header)
        .body(axum::body::Body::empty())
        .map_err(|e| ApiError::internal(format!("Failed to build request: {e}")))?;

    match ServeFile::new(path).try_call(req).await {
        Ok(res) => Ok(res),
        Err(e) => Err(ApiError::internal(format!("Streaming error: {e}"))),
    }
}
