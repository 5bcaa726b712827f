use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::Redirect,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{
    AdminPanelDto, ApiError, ApiResponse, AppState, LinkPrefixDto, TrackDto, UserDto, auth,
};

#[derive(Debug, Deserialize)]
pub struct PanelQuery {
    pub q: Option<String>,
    pub page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct LinkPrefixRequest {
    pub link_prefix: String,
}

/// GET/POST /admin
pub async fn redirect_to_panel(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Redirect, ApiError> {
    auth::require_admin(&session, &state).await?;
    Ok(Redirect::to("/admin/panel"))
}

/// GET /admin/panel
/// Paginated user roster plus the full track list with optional search.
pub async fn panel(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(params): Query<PanelQuery>,
) -> Result<Json<ApiResponse<AdminPanelDto>>, ApiError> {
    auth::require_admin(&session, &state).await?;

    let page = params.page.unwrap_or(1).max(1);
    let page_size = state.config().read().await.uploads.page_size;
    let query = params.q.as_deref().filter(|q| !q.is_empty());

    let (users, user_total_pages) = state
        .store()
        .list_users(page, page_size)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let track_models = state
        .store()
        .list_all_tracks(query)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let link_prefix = state.library().link_prefix().await?;
    let tracks = track_models
        .into_iter()
        .map(|m| TrackDto::from_model(m, &link_prefix))
        .collect();

    Ok(Json(ApiResponse::success(AdminPanelDto {
        users: users.into_iter().map(UserDto::from).collect(),
        user_page: page,
        user_total_pages,
        tracks,
        query: query.map(ToString::to_string),
        link_prefix,
    })))
}

/// POST /admin/delete-user/{user_id}
/// Removes the user, their uploads and the files behind them.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(user_id): Path<i32>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    auth::require_admin(&session, &state).await?;

    let user = state
        .store()
        .get_user(user_id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::user_not_found(user_id))?;

    if !state.library().delete_user(user_id).await? {
        return Err(ApiError::user_not_found(user_id));
    }

    Ok(Json(ApiResponse::success(format!(
        "Deleted user {}",
        user.username
    ))))
}

/// POST /admin/set-link-prefix
/// Persists the base URL used when composing shareable playback links.
pub async fn set_link_prefix(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(payload): Form<LinkPrefixRequest>,
) -> Result<Json<ApiResponse<LinkPrefixDto>>, ApiError> {
    auth::require_admin(&session, &state).await?;

    let prefix = payload.link_prefix.trim();
    if prefix.is_empty() {
        return Err(ApiError::validation("Link prefix cannot be empty"));
    }

    state.library().set_link_prefix(prefix).await?;
    let link_prefix = state.library().link_prefix().await?;

    tracing::info!("Link prefix updated to {link_prefix}");

    Ok(Json(ApiResponse::success(LinkPrefixDto { link_prefix })))
}
