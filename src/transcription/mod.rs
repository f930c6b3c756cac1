/*!
 * Transcription of audio segments into subtitles.
 *
 * - `retry`: retry policies for the provider boundary
 * - `core`: transcription of a single segment with upload cleanup
 * - `batch`: concurrent, order preserving transcription of all segments
 */

pub use self::batch::{dispatch_ordered, BatchTranscriber, RunOutcome};
pub use self::core::{TranscriptionService, UploadGuard};
pub use self::retry::{Recoverability, RetryContext, RetryPolicy};

pub mod batch;
pub mod core;
pub mod retry;
