use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::entities::tracks;

pub mod migrator;
pub mod repositories;

pub use repositories::setting::LINK_PREFIX_KEY;
pub use repositories::track::NewTrack;
pub use repositories::user::User;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn track_repo(&self) -> repositories::track::TrackRepository {
        repositories::track::TrackRepository::new(self.conn.clone())
    }

    fn setting_repo(&self) -> repositories::setting::SettingRepository {
        repositories::setting::SettingRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn ensure_admin_user(&self, username: &str, password: &str) -> Result<()> {
        self.user_repo().ensure_admin(username, password).await
    }

    pub async fn create_user(&self, username: &str, password: &str, is_admin: bool) -> Result<User> {
        self.user_repo().create(username, password, is_admin).await
    }

    pub async fn get_user(&self, id: i32) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_credentials(username, password).await
    }

    pub async fn list_users(&self, page: u64, page_size: u64) -> Result<(Vec<User>, u64)> {
        self.user_repo().list(page, page_size).await
    }

    pub async fn delete_user_with_tracks(&self, user_id: i32) -> Result<bool> {
        self.user_repo().delete_with_tracks(user_id).await
    }

    // ========== Tracks ==========

    pub async fn insert_tracks(&self, batch: &[NewTrack]) -> Result<Vec<tracks::Model>> {
        self.track_repo().insert_batch(batch).await
    }

    pub async fn list_tracks(
        &self,
        query: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> Result<(Vec<tracks::Model>, u64)> {
        self.track_repo().list(query, page, page_size).await
    }

    pub async fn list_all_tracks(&self, query: Option<&str>) -> Result<Vec<tracks::Model>> {
        self.track_repo().list_all(query).await
    }

    pub async fn get_track(&self, id: i32) -> Result<Option<tracks::Model>> {
        self.track_repo().get(id).await
    }

    pub async fn get_track_by_stored_name(
        &self,
        stored_name: &str,
    ) -> Result<Option<tracks::Model>> {
        self.track_repo().get_by_stored_name(stored_name).await
    }

    pub async fn list_tracks_for_user(&self, user_id: i32) -> Result<Vec<tracks::Model>> {
        self.track_repo().list_for_user(user_id).await
    }

    pub async fn delete_track(&self, id: i32) -> Result<bool> {
        self.track_repo().delete(id).await
    }

    // ========== Settings ==========

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        self.setting_repo().get(key).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.setting_repo().set(key, value).await
    }
}
