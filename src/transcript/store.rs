use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use super::Utterance;

/// Durable storage seam for finalized transcripts
///
/// The session coordinator flushes through this exactly once per session;
/// implementations decide where the transcript actually lands (file, record
/// in the submissions store, etc.).
#[async_trait::async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Persist a finalized transcript for the given session
    async fn save(&self, session_id: &str, entries: &[Utterance]) -> Result<()>;
}

/// File-backed transcript store
///
/// Writes one pretty-printed JSON file per session under the configured
/// directory: `<dir>/<session_id>.json`.
pub struct JsonFileStore {
    output_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.output_dir.join(format!("{}.json", session_id))
    }
}

#[async_trait::async_trait]
impl TranscriptStore for JsonFileStore {
    async fn save(&self, session_id: &str, entries: &[Utterance]) -> Result<()> {
        if entries.is_empty() {
            warn!("Session {} produced an empty transcript", session_id);
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .context("Failed to create transcript output directory")?;

        let path = self.path_for(session_id);
        let json =
            serde_json::to_vec_pretty(entries).context("Failed to serialize transcript")?;

        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;

        info!(
            "Transcript for session {} saved: {} ({} utterances)",
            session_id,
            path.display(),
            entries.len()
        );

        Ok(())
    }
}
