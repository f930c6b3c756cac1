/*!
 * Per-segment transcription.
 *
 * One call uploads the segment, asks the provider for a transcript until it
 * passes validation against the segment's own duration, and releases the
 * uploaded file on every exit path.
 */

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::app_config::RetryConfig;
use crate::audio::AudioSegment;
use crate::errors::TranscriptionError;
use crate::providers::{RemoteFile, Transcriber};
use crate::subtitle_processor::SubtitleEntry;
use crate::validation::validate_subtitles;

use super::retry::{transport_policy, validation_policy};

/// Upper bound for waiting on deletes of abandoned uploads
pub const RELEASE_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Uploaded file that must be removed from the provider again
///
/// `release` awaits the delete. A guard dropped without release (a cancelled
/// task) spawns the delete on `releases` instead, so that the owner can wait
/// for it before the process exits.
pub struct UploadGuard {
    provider: Arc<dyn Transcriber>,
    file: RemoteFile,
    releases: TaskTracker,
    released: bool,
}

impl UploadGuard {
    pub fn new(provider: Arc<dyn Transcriber>, file: RemoteFile, releases: TaskTracker) -> Self {
        Self {
            provider,
            file,
            releases,
            released: false,
        }
    }

    pub fn file(&self) -> &RemoteFile {
        &self.file
    }

    /// Delete the file; failures are only logged
    pub async fn release(mut self) {
        if let Err(e) = self.provider.delete(&self.file).await {
            warn!("Failed to remove uploaded file {}: {}", self.file.name, e);
        }
        self.released = true;
    }
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let provider = Arc::clone(&self.provider);
        let file = self.file.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let delete = async move {
                    if let Err(e) = provider.delete(&file).await {
                        warn!("Failed to remove uploaded file {}: {}", file.name, e);
                    }
                };
                self.releases.spawn_on(delete, &handle);
            }
            Err(_) => warn!("Uploaded file {} was not removed: no runtime available", file.name),
        }
    }
}

/// Transcription of single segments through a provider
#[derive(Clone)]
pub struct TranscriptionService {
    provider: Arc<dyn Transcriber>,
    retry: RetryConfig,
    /// Deletes spawned by guards dropped mid-call
    releases: TaskTracker,
}

impl TranscriptionService {
    pub fn new(provider: Arc<dyn Transcriber>, retry: RetryConfig) -> Self {
        Self {
            provider,
            retry,
            releases: TaskTracker::new(),
        }
    }

    /// Wait for the deletes of abandoned uploads, at most `limit`
    ///
    /// Returns false when some deletes were still running at the deadline.
    pub async fn drain_releases(&self, limit: Duration) -> bool {
        if self.releases.is_empty() {
            return true;
        }

        debug!("Waiting for {} pending upload removals", self.releases.len());
        self.releases.close();
        let finished = tokio::time::timeout(limit, self.releases.wait()).await.is_ok();
        self.releases.reopen();
        if !finished {
            warn!("{} uploaded files may not have been removed", self.releases.len());
        }
        finished
    }

    pub fn provider(&self) -> &Arc<dyn Transcriber> {
        &self.provider
    }

    /// Transcribe one segment into subtitles relative to its start
    ///
    /// Transport failures are retried per request; transcripts that fail
    /// validation are regenerated under the larger validation budget.
    pub async fn transcribe_segment(&self, segment: &AudioSegment) -> Result<Vec<SubtitleEntry>, TranscriptionError> {
        let transport = transport_policy(&self.retry);
        let validation = validation_policy(&self.retry);

        let file = transport.execute(|_| self.provider.upload(segment)).await?;
        let guard = UploadGuard::new(Arc::clone(&self.provider), file, self.releases.clone());

        let result = validation
            .execute(|_| {
                let transport = &transport;
                let provider = &self.provider;
                let file = guard.file();
                async move {
                    let entries = transport.execute(|_| provider.transcribe(file)).await?;
                    validate_subtitles(&entries, segment.duration_ms)?;
                    Ok::<_, TranscriptionError>(entries)
                }
            })
            .await;

        guard.release().await;

        let entries = result?;
        debug!(
            "Segment {} ({}ms): {} subtitles from {}",
            segment.index,
            segment.duration_ms,
            entries.len(),
            self.provider.model_name()
        );
        Ok(entries)
    }
}
