use axum::{Json, extract::Multipart, extract::State};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, UploadInfoDto, UploadReportDto, auth};

/// GET /upload
/// What the upload form needs to know: accepted extensions and batch cap.
pub async fn upload_info(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<UploadInfoDto>> {
    let config = state.config().read().await;
    Json(ApiResponse::success(UploadInfoDto {
        allowed_extensions: config.uploads.allowed_extensions.clone(),
        max_batch_files: config.uploads.max_batch_files,
    }))
}

/// POST /upload
/// Multipart batch upload. Login is optional; uploads from an anonymous
/// session simply carry no owner.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadReportDto>>, ApiError> {
    let max_batch_files = state.config().read().await.uploads.max_batch_files;
    let user = auth::current_user(&session, &state).await?;

    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        // Only parts carrying a filename are file uploads; other form
        // fields are ignored.
        let Some(filename) = field.file_name().map(ToString::to_string) else {
            continue;
        };

        if files.len() >= max_batch_files {
            return Err(ApiError::validation(format!(
                "Too many files in one batch (limit {max_batch_files})"
            )));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to read file {filename}: {e}")))?;

        files.push((filename, data.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::validation("No files provided"));
    }

    let outcome = state
        .uploads()
        .process_batch(files, user.map(|u| u.id))
        .await?;

    Ok(Json(ApiResponse::success(UploadReportDto::from(outcome))))
}
