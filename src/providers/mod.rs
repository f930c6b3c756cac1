/*!
 * Transcription provider implementations.
 *
 * - `gemini`: Google Gemini API client (File API upload + generateContent)
 * - `mock`: scripted provider for tests
 */

use async_trait::async_trait;
use std::fmt::Debug;

use crate::audio::AudioSegment;
use crate::errors::ProviderError;
use crate::subtitle_processor::SubtitleEntry;

/// Handle of an audio file stored on the provider side
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Resource name used for deletion, e.g. `files/abc123`
    pub name: String,
    /// URI referenced by generation requests
    pub uri: String,
    pub mime_type: String,
}

/// Common trait for all transcription providers
///
/// Implementations must be safe to share between concurrent workers; the
/// pipeline holds one instance behind an `Arc`.
#[async_trait]
pub trait Transcriber: Send + Sync + Debug + 'static {
    /// Store the segment's audio on the provider side
    async fn upload(&self, segment: &AudioSegment) -> Result<RemoteFile, ProviderError>;

    /// Transcribe an uploaded segment
    ///
    /// Timestamps are relative to the start of the segment. The result is not
    /// validated here.
    async fn transcribe(&self, file: &RemoteFile) -> Result<Vec<SubtitleEntry>, ProviderError>;

    /// Remove an uploaded file
    async fn delete(&self, file: &RemoteFile) -> Result<(), ProviderError>;

    /// Model identifier used for logging
    fn model_name(&self) -> &str;
}

pub mod gemini;
pub mod mock;
