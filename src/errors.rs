/*!
 * Error types for the subtool application.
 *
 * The transcription core reports typed errors so that callers can still see
 * the classification of a failure after it has crossed the retry layer and
 * the dispatcher. The CLI glue converts everything into `anyhow` at the edge.
 */

use thiserror::Error;

/// A single quota violation reported by the transcription API
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuotaViolation {
    /// Metric the quota applies to, e.g. `generate_content_free_tier_requests`
    pub quota_metric: String,
    /// Quota identifier, e.g. `GenerateRequestsPerDayPerProjectPerModel-FreeTier`
    pub quota_id: String,
}

/// Structured details extracted from an API error body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiErrorDetails {
    /// Quota failures, if the error was a quota error
    pub quota_violations: Vec<QuotaViolation>,
    /// Server suggested retry delay, verbatim (e.g. `"33s"`)
    pub retry_delay: Option<String>,
}

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The model answered without any usable content
    #[error("API returned an empty response")]
    EmptyResponse,

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} {status} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Symbolic status, e.g. `RESOURCE_EXHAUSTED`
        status: String,
        /// Error message from the API
        message: String,
        /// Structured details (quota violations, retry info)
        details: ApiErrorDetails,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl ProviderError {
    /// Returns the structured details when this is an API error
    pub fn details(&self) -> Option<&ApiErrorDetails> {
        match self {
            Self::ApiError { details, .. } => Some(details),
            _ => None,
        }
    }
}

/// Timeline invariant violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Subtitle ends at {end_ms}ms ({end_ts}) but the audio only lasts {duration_ms}ms ({duration_ts})")]
    EndsAfterDuration {
        end_ms: u64,
        end_ts: String,
        duration_ms: u64,
        duration_ts: String,
    },

    #[error("Subtitle {index} starts at {start_ms}ms, after its end at {end_ms}ms")]
    InvalidTimeRange {
        index: usize,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("Subtitle {index} starts at {start_ms}ms, before the previous subtitle ends at {previous_end_ms}ms")]
    Overlap {
        index: usize,
        start_ms: u64,
        previous_end_ms: u64,
    },
}

/// Errors raised while assembling the global timeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// Caller error, never retried
    #[error("Invalid merge input: {0}")]
    Precondition(String),

    /// The merged timeline broke an invariant
    #[error("Merged timeline is invalid: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors that can occur during transcription
#[derive(Error, Debug)]
pub enum TranscriptionError {
    /// Error from the provider API
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The model produced a transcript that breaks the timeline invariants
    #[error("Invalid transcript: {0}")]
    InvalidOutput(#[from] ValidationError),

    /// Error while merging segment transcripts
    #[error("Timeline error: {0}")]
    Timeline(#[from] TimelineError),

    /// Error attributed to one audio segment
    #[error("Segment {index} failed: {source}")]
    Segment {
        index: usize,
        #[source]
        source: Box<TranscriptionError>,
    },

    /// Error while preparing audio
    #[error("Audio error: {0}")]
    Audio(String),
}

impl TranscriptionError {
    /// Strips segment attribution and returns the underlying error
    pub fn root(&self) -> &TranscriptionError {
        match self {
            Self::Segment { source, .. } => source.root(),
            other => other,
        }
    }
}
