use axum::{Form, Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, SessionDto, UserDto};
use crate::db::User;

const USER_ID_KEY: &str = "user_id";

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// GET /login
/// Reports whether the current session is authenticated and as whom.
pub async fn session_info(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<SessionDto>>, ApiError> {
    let user = current_user(&session, &state).await?;

    Ok(Json(ApiResponse::success(SessionDto {
        authenticated: user.is_some(),
        user: user.map(UserDto::from),
    })))
}

/// POST /login
/// Form-encoded credentials. Failures never reveal whether the username
/// or the password was the wrong half.
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Form(payload): Form<LoginRequest>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    if payload.username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let user = state
        .store()
        .verify_credentials(&payload.username, &payload.password)
        .await
        .map_err(|e| ApiError::internal(format!("Authentication error: {e}")))?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    session
        .insert(USER_ID_KEY, user.id)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    tracing::info!("User {} logged in", user.username);

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}

/// GET /logout
pub async fn logout(session: Session) -> Result<impl IntoResponse, ApiError> {
    let user_id: Option<i32> = session
        .get(USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    if user_id.is_none() {
        return Err(ApiError::unauthorized("Not logged in"));
    }

    session
        .flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to clear session: {e}")))?;

    Ok(Json(ApiResponse::success("Logged out".to_string())))
}

/// Resolves the session to a user, dropping sessions whose user row has
/// since been deleted.
pub async fn current_user(session: &Session, state: &AppState) -> Result<Option<User>, ApiError> {
    let user_id: Option<i32> = session
        .get(USER_ID_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let user = state
        .store()
        .get_user(user_id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    if user.is_none() {
        let _ = session.flush().await;
    }

    Ok(user)
}

pub async fn require_user(session: &Session, state: &AppState) -> Result<User, ApiError> {
    current_user(session, state)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Login required"))
}

pub async fn require_admin(session: &Session, state: &AppState) -> Result<User, ApiError> {
    let user = require_user(session, state).await?;
    if !user.is_admin {
        return Err(ApiError::forbidden("Admin access required"));
    }
    Ok(user)
}
