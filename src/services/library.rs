use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{LINK_PREFIX_KEY, Store};
use crate::entities::tracks;

/// Track deletion and link composition, shared by the public and admin
/// endpoints. File removal happens before the database row goes away, so a
/// crash in between leaves a dangling row rather than an orphaned file.
pub struct LibraryService {
    store: Store,
    config: Arc<RwLock<Config>>,
}

impl LibraryService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self { store, config }
    }

    /// The base URL used when composing playback links. The persisted
    /// setting wins; the config value is the fallback for fresh databases.
    pub async fn link_prefix(&self) -> Result<String> {
        let prefix = match self.store.get_setting(LINK_PREFIX_KEY).await? {
            Some(value) => value,
            None => self.config.read().await.uploads.link_prefix.clone(),
        };
        Ok(prefix.trim_end_matches('/').to_string())
    }

    pub async fn set_link_prefix(&self, prefix: &str) -> Result<()> {
        self.store
            .set_setting(LINK_PREFIX_KEY, prefix.trim_end_matches('/'))
            .await
    }

    pub fn play_url(prefix: &str, stored_name: &str) -> String {
        format!("{prefix}/play/{stored_name}")
    }

    /// Deletes the on-disk file (absence is not an error) and then the row.
    pub async fn delete_track(&self, track: &tracks::Model) -> Result<bool> {
        self.remove_track_file(&track.stored_name).await;

        let deleted = self.store.delete_track(track.id).await?;
        if deleted {
            metrics::counter!("tracks_deleted_total").increment(1);
            info!("Deleted track {} ({})", track.id, track.original_name);
        }
        Ok(deleted)
    }

    /// Removes every file the user uploaded, then the user and their track
    /// rows in one transaction. Returns false when the user does not exist.
    pub async fn delete_user(&self, user_id: i32) -> Result<bool> {
        let tracks = self.store.list_tracks_for_user(user_id).await?;
        for track in &tracks {
            self.remove_track_file(&track.stored_name).await;
        }

        let deleted = self.store.delete_user_with_tracks(user_id).await?;
        if deleted {
            info!(
                "Deleted user {user_id} along with {} track(s)",
                tracks.len()
            );
        }
        Ok(deleted)
    }

    pub async fn track_path(&self, stored_name: &str) -> PathBuf {
        let config = self.config.read().await;
        PathBuf::from(&config.uploads.upload_path).join(stored_name)
    }

    async fn remove_track_file(&self, stored_name: &str) {
        let path = self.track_path(stored_name).await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove file {}: {e}", path.display()),
        }
    }
}
