use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

pub struct MediaService;

impl Default for MediaService {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaService {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Probe the playback duration of an audio file in whole seconds.
    ///
    /// Uses the container duration when present and falls back to the first
    /// audio stream. Callers treat any error as "duration unknown"; probing
    /// must never fail an upload.
    pub fn probe_duration_secs(&self, path: &Path) -> Result<i64> {
        let output = ffprobe::ffprobe(path)
            .with_context(|| format!("Failed to run ffprobe on {}", path.display()))?;

        let duration = output
            .format
            .duration
            .and_then(|d| d.parse::<f64>().ok())
            .or_else(|| {
                output
                    .streams
                    .iter()
                    .find(|s| s.codec_type.as_deref() == Some("audio"))
                    .and_then(|s| s.duration.as_ref())
                    .and_then(|d| d.parse::<f64>().ok())
            })
            .context("No duration reported by ffprobe")?;

        debug!("Probed {:?}: {duration}s", path);

        #[allow(clippy::cast_possible_truncation)]
        Ok(duration.floor() as i64)
    }
}
