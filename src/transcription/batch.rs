/*!
 * Concurrent transcription of all segments.
 *
 * Segments are transcribed by a bounded pool of workers. Results are slotted
 * by segment index, so the output order never depends on which call finished
 * first. The first segment that fails for good ends the run: its error is
 * returned and the remaining work is dropped, which cancels it.
 */

use futures::stream::{self, StreamExt};
use log::{error, info};
use std::future::Future;
use std::pin::pin;
use tokio_util::sync::CancellationToken;

use crate::audio::AudioSegment;
use crate::errors::TranscriptionError;
use crate::subtitle_processor::SubtitleEntry;
use crate::timeline::merge_subtitle_events;

use super::core::{TranscriptionService, RELEASE_DRAIN_TIMEOUT};

/// Result of a run that may be interrupted by the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    Completed(T),
    Aborted,
}

impl<T> RunOutcome<T> {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RunOutcome<U> {
        match self {
            Self::Completed(value) => RunOutcome::Completed(f(value)),
            Self::Aborted => RunOutcome::Aborted,
        }
    }
}

/// Run `f` over `items` with at most `workers` calls in flight
///
/// Returns the results in input order. `on_progress(done, total)` is called
/// after every successful item. When `cancel` fires, everything in flight is
/// dropped and `RunOutcome::Aborted` is returned.
pub async fn dispatch_ordered<I, T, F, Fut>(
    items: Vec<I>,
    workers: usize,
    cancel: &CancellationToken,
    on_progress: impl Fn(usize, usize),
    f: F,
) -> Result<RunOutcome<Vec<T>>, TranscriptionError>
where
    F: Fn(usize, I) -> Fut,
    Fut: Future<Output = Result<T, TranscriptionError>>,
{
    let total = items.len();
    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();

    let mut results = pin!(
        stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let call = f(index, item);
                async move { (index, call.await) }
            })
            .buffer_unordered(workers.max(1))
    );

    let mut completed = 0;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Run cancelled with {}/{} segments done", completed, total);
                return Ok(RunOutcome::Aborted);
            }
            next = results.next() => next,
        };

        let Some((index, result)) = next else {
            break;
        };

        match result {
            Ok(value) => {
                slots[index] = Some(value);
                completed += 1;
                on_progress(completed, total);
            }
            Err(source) => {
                error!("Segment {} failed: {}", index, source);
                return Err(TranscriptionError::Segment {
                    index,
                    source: Box::new(source),
                });
            }
        }
    }

    Ok(RunOutcome::Completed(slots.into_iter().flatten().collect()))
}

/// Transcribes every segment and assembles the global timeline
pub struct BatchTranscriber {
    service: TranscriptionService,
    workers: usize,
}

impl BatchTranscriber {
    pub fn new(service: TranscriptionService, workers: usize) -> Self {
        Self {
            service,
            workers: workers.max(1),
        }
    }

    /// Transcribe `segments` concurrently and merge the transcripts
    pub async fn transcribe_all(
        &self,
        segments: &[AudioSegment],
        cancel: &CancellationToken,
        on_progress: impl Fn(usize, usize),
    ) -> Result<RunOutcome<Vec<SubtitleEntry>>, TranscriptionError> {
        let durations: Vec<u64> = segments.iter().map(|s| s.duration_ms).collect();

        info!(
            "Transcribing {} segments with {} using {} workers",
            segments.len(),
            self.service.provider().model_name(),
            self.workers
        );

        let result = dispatch_ordered(
            segments.iter().collect(),
            self.workers,
            cancel,
            on_progress,
            |_, segment| self.service.transcribe_segment(segment),
        )
        .await;

        // Calls dropped by an abort or a fatal error left their deletes behind
        self.service.drain_releases(RELEASE_DRAIN_TIMEOUT).await;

        let outcome = result?;

        match outcome {
            RunOutcome::Completed(groups) => {
                let merged = merge_subtitle_events(groups, &durations)?;
                info!("Transcription produced {} subtitles", merged.len());
                Ok(RunOutcome::Completed(merged))
            }
            RunOutcome::Aborted => Ok(RunOutcome::Aborted),
        }
    }
}
