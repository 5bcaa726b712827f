use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::Config;
use crate::db::{NewTrack, Store};
use crate::services::media::MediaService;

/// One file accepted into the library.
#[derive(Debug, Clone)]
pub struct AcceptedUpload {
    pub id: i32,
    pub original_name: String,
    pub stored_name: String,
    pub duration_secs: Option<i64>,
}

/// One file skipped during a batch, with the reason shown to the uploader.
#[derive(Debug, Clone)]
pub struct RejectedUpload {
    pub filename: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub accepted: Vec<AcceptedUpload>,
    pub rejected: Vec<RejectedUpload>,
}

pub struct UploadService {
    store: Store,
    config: Arc<RwLock<Config>>,
    media: MediaService,
}

impl UploadService {
    #[must_use]
    pub const fn new(store: Store, config: Arc<RwLock<Config>>) -> Self {
        Self {
            store,
            config,
            media: MediaService::new(),
        }
    }

    /// Process one multipart batch. Rejected files never abort the batch;
    /// they are reported per-file while the rest proceeds. All database rows
    /// commit together, and if that commit fails every file written during
    /// this request is removed again so no orphans are left behind.
    pub async fn process_batch(
        &self,
        files: Vec<(String, Vec<u8>)>,
        user_id: Option<i32>,
    ) -> Result<UploadOutcome> {
        let (upload_path, allowed) = {
            let config = self.config.read().await;
            (
                PathBuf::from(&config.uploads.upload_path),
                config.uploads.allowed_extensions.clone(),
            )
        };

        tokio::fs::create_dir_all(&upload_path)
            .await
            .with_context(|| format!("Failed to create upload dir {}", upload_path.display()))?;

        let mut outcome = UploadOutcome::default();
        let mut batch: Vec<NewTrack> = Vec::new();
        let mut written: Vec<PathBuf> = Vec::new();

        for (original_name, data) in files {
            let Some(ext) = allowed_extension(&original_name, &allowed) else {
                warn!("Rejected upload with unsupported name: {original_name:?}");
                outcome.rejected.push(RejectedUpload {
                    reason: rejection_reason(&original_name),
                    filename: original_name,
                });
                continue;
            };

            let stored_name = generate_stored_name(&ext);
            let save_path = upload_path.join(&stored_name);

            if let Err(e) = tokio::fs::write(&save_path, &data).await {
                // A failed disk write poisons the whole batch; clean up and
                // surface the error so nothing half-committed survives.
                remove_files(&written).await;
                return Err(e).with_context(|| {
                    format!("Failed to write uploaded file {}", save_path.display())
                });
            }
            written.push(save_path.clone());

            let duration_secs = match self.media.probe_duration_secs(&save_path) {
                Ok(secs) => Some(secs),
                Err(e) => {
                    warn!("Duration probe failed for {original_name:?}: {e}");
                    None
                }
            };

            batch.push(NewTrack {
                filename: sanitize_filename(&original_name),
                original_name,
                stored_name,
                duration_secs,
                user_id,
            });
        }

        metrics::counter!("uploads_rejected_total").increment(outcome.rejected.len() as u64);

        if batch.is_empty() {
            return Ok(outcome);
        }

        match self.store.insert_tracks(&batch).await {
            Ok(models) => {
                for model in models {
                    outcome.accepted.push(AcceptedUpload {
                        id: model.id,
                        original_name: model.original_name,
                        stored_name: model.stored_name,
                        duration_secs: model.duration_secs,
                    });
                }
            }
            Err(e) => {
                remove_files(&written).await;
                return Err(e.context("Upload batch commit failed; files removed"));
            }
        }

        metrics::counter!("uploads_accepted_total").increment(outcome.accepted.len() as u64);

        info!(
            "Upload batch finished: {} accepted, {} rejected",
            outcome.accepted.len(),
            outcome.rejected.len()
        );

        Ok(outcome)
    }
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove file {}: {e}", path.display());
        }
    }
}

fn rejection_reason(filename: &str) -> String {
    if filename.is_empty() {
        "Empty filename".to_string()
    } else {
        format!("File {filename} is not an MP3")
    }
}

/// Returns the (lowercased) extension when the filename is non-empty and
/// carries an allowed extension, case-insensitively.
fn allowed_extension(filename: &str, allowed: &[String]) -> Option<String> {
    if filename.is_empty() {
        return None;
    }

    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .to_lowercase();

    allowed.contains(&ext).then_some(ext)
}

/// Random collision-resistant on-disk name: 32 hex chars plus extension.
/// Uniqueness is by construction; the `stored_name` unique constraint is the
/// final backstop.
#[must_use]
pub fn generate_stored_name(ext: &str) -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();

    let token = bytes.iter().fold(String::with_capacity(32), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    });

    format!("{token}.{ext}")
}

/// Reduce an uploader-supplied name to something safe for display and
/// download headers: ASCII alphanumerics, dot, dash and underscore only,
/// with no leading dots.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp3_only() -> Vec<String> {
        vec!["mp3".to_string()]
    }

    #[test]
    fn test_allowed_extension_case_insensitive() {
        assert_eq!(
            allowed_extension("Song.MP3", &mp3_only()),
            Some("mp3".to_string())
        );
        assert_eq!(
            allowed_extension("song.mp3", &mp3_only()),
            Some("mp3".to_string())
        );
    }

    #[test]
    fn test_allowed_extension_rejects() {
        assert_eq!(allowed_extension("notes.txt", &mp3_only()), None);
        assert_eq!(allowed_extension("", &mp3_only()), None);
        assert_eq!(allowed_extension("mp3", &mp3_only()), None);
        assert_eq!(allowed_extension("archive.mp3.zip", &mp3_only()), None);
    }

    #[test]
    fn test_generate_stored_name_shape() {
        let name = generate_stored_name("mp3");
        assert!(name.ends_with(".mp3"));
        let token = name.strip_suffix(".mp3").unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generate_stored_name_distinct() {
        // Collision resistance in the small: repeated calls never repeat.
        let names: std::collections::HashSet<_> =
            (0..100).map(|_| generate_stored_name("mp3")).collect();
        assert_eq!(names.len(), 100);
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Song One.mp3"), "Song_One.mp3");
        assert_eq!(sanitize_filename("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_filename("héllo.mp3"), "h_llo.mp3");
        assert_eq!(sanitize_filename("...."), "file");
    }
}
