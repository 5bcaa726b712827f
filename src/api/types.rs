use serde::Serialize;

use crate::db::User;
use crate::entities::tracks;
use crate::services::{AcceptedUpload, LibraryService, RejectedUpload, UploadOutcome};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub is_admin: bool,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackDto {
    pub id: i32,
    pub original_name: String,
    pub filename: String,
    pub duration_secs: Option<i64>,
    pub uploaded_at: String,
    pub user_id: Option<i32>,
    pub play_url: String,
}

impl TrackDto {
    pub fn from_model(model: tracks::Model, link_prefix: &str) -> Self {
        let play_url = LibraryService::play_url(link_prefix, &model.stored_name);
        Self {
            id: model.id,
            original_name: model.original_name,
            filename: model.filename,
            duration_secs: model.duration_secs,
            uploaded_at: model.uploaded_at,
            user_id: model.user_id,
            play_url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
}

#[derive(Debug, Serialize)]
pub struct TrackPageDto {
    pub tracks: Vec<TrackDto>,
    pub page: u64,
    pub total_pages: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadInfoDto {
    pub allowed_extensions: Vec<String>,
    pub max_batch_files: usize,
}

#[derive(Debug, Serialize)]
pub struct UploadedTrackDto {
    pub id: i32,
    pub original_name: String,
    pub stored_name: String,
    pub duration_secs: Option<i64>,
}

impl From<AcceptedUpload> for UploadedTrackDto {
    fn from(upload: AcceptedUpload) -> Self {
        Self {
            id: upload.id,
            original_name: upload.original_name,
            stored_name: upload.stored_name,
            duration_secs: upload.duration_secs,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RejectedFileDto {
    pub filename: String,
    pub reason: String,
}

impl From<RejectedUpload> for RejectedFileDto {
    fn from(rejected: RejectedUpload) -> Self {
        Self {
            filename: rejected.filename,
            reason: rejected.reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadReportDto {
    pub accepted: Vec<UploadedTrackDto>,
    pub rejected: Vec<RejectedFileDto>,
}

impl From<UploadOutcome> for UploadReportDto {
    fn from(outcome: UploadOutcome) -> Self {
        Self {
            accepted: outcome.accepted.into_iter().map(Into::into).collect(),
            rejected: outcome.rejected.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminPanelDto {
    pub users: Vec<UserDto>,
    pub user_page: u64,
    pub user_total_pages: u64,
    pub tracks: Vec<TrackDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    pub link_prefix: String,
}

#[derive(Debug, Serialize)]
pub struct LinkPrefixDto {
    pub link_prefix: String,
}
