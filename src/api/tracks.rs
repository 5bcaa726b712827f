use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, SessionDto, TrackDto, TrackPageDto, UserDto, auth};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
}

#[derive(Debug, serde::Serialize)]
pub struct IndexDto {
    pub session: SessionDto,
    #[serde(flatten)]
    pub tracks: TrackPageDto,
}

/// GET /
/// Landing view: who is logged in plus the first page of the library.
pub async fn index(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(params): Query<ListQuery>,
) -> Result<Json<ApiResponse<IndexDto>>, ApiError> {
    let user = auth::current_user(&session, &state).await?;
    let tracks = track_page(&state, &params).await?;

    Ok(Json(ApiResponse::success(IndexDto {
        session: SessionDto {
            authenticated: user.is_some(),
            user: user.map(UserDto::from),
        },
        tracks,
    })))
}

/// GET /music
/// Paginated library listing, newest first, with optional name search.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ApiResponse<TrackPageDto>>, ApiError> {
    let page = track_page(&state, &params).await?;
    Ok(Json(ApiResponse::success(page)))
}

async fn track_page(state: &AppState, params: &ListQuery) -> Result<TrackPageDto, ApiError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = state.config().read().await.uploads.page_size;
    let query = params.q.as_deref().filter(|q| !q.is_empty());

    let (models, total_pages) = state
        .store()
        .list_tracks(query, page, page_size)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let link_prefix = state.library().link_prefix().await?;
    let tracks = models
        .into_iter()
        .map(|m| TrackDto::from_model(m, &link_prefix))
        .collect();

    Ok(TrackPageDto {
        tracks,
        page,
        total_pages,
        query: query.map(ToString::to_string),
    })
}

/// POST /delete/{music_id}
/// Admins can delete anything; everyone else only their own uploads.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(music_id): Path<i32>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let user = auth::require_user(&session, &state).await?;

    let track = state
        .store()
        .get_track(music_id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::track_not_found(music_id))?;

    if !user.is_admin && track.user_id != Some(user.id) {
        return Err(ApiError::forbidden("You can only delete your own uploads"));
    }

    if !state.library().delete_track(&track).await? {
        return Err(ApiError::track_not_found(music_id));
    }

    Ok(Json(ApiResponse::success(format!(
        "Deleted {}",
        track.original_name
    ))))
}
