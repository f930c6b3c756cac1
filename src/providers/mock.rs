/*!
 * Scripted transcriber for tests.
 *
 * Every segment index gets its own script: a queue of steps consumed one per
 * `transcribe` call, then a fallback transcript once the queue is empty.
 * Uploads and deletes are counted so tests can check that every uploaded file
 * was released.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::audio::AudioSegment;
use crate::errors::{ApiErrorDetails, ProviderError, QuotaViolation};
use crate::providers::{RemoteFile, Transcriber};
use crate::subtitle_processor::SubtitleEntry;

/// Failure kinds the mock can simulate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// 429 with a per-minute quota violation and a retry delay in seconds
    MinuteQuota { retry_delay_secs: u64 },
    /// 429 with a per-day quota violation
    DailyQuota,
    /// 5xx without details
    ServerError(u16),
    /// Candidate without text
    Empty,
    /// Connection reset
    Connection,
}

impl MockFailure {
    pub fn to_error(self) -> ProviderError {
        match self {
            Self::MinuteQuota { retry_delay_secs } => quota_error(
                "GenerateRequestsPerMinutePerProjectPerModel-FreeTier",
                Some(format!("{}s", retry_delay_secs)),
            ),
            Self::DailyQuota => quota_error("GenerateRequestsPerDayPerProjectPerModel-FreeTier", None),
            Self::ServerError(status_code) => ProviderError::ApiError {
                status_code,
                status: "INTERNAL".to_string(),
                message: "Simulated server failure".to_string(),
                details: ApiErrorDetails::default(),
            },
            Self::Empty => ProviderError::EmptyResponse,
            Self::Connection => ProviderError::ConnectionError("Simulated connection reset".to_string()),
        }
    }
}

fn quota_error(quota_id: &str, retry_delay: Option<String>) -> ProviderError {
    ProviderError::ApiError {
        status_code: 429,
        status: "RESOURCE_EXHAUSTED".to_string(),
        message: "You exceeded your current quota".to_string(),
        details: ApiErrorDetails {
            quota_violations: vec![QuotaViolation {
                quota_metric: "generativelanguage.googleapis.com/generate_content_free_tier_requests".to_string(),
                quota_id: quota_id.to_string(),
            }],
            retry_delay,
        },
    }
}

/// One scripted answer to a `transcribe` call
#[derive(Debug, Clone, PartialEq)]
pub enum MockStep {
    Transcript(Vec<SubtitleEntry>),
    Fail(MockFailure),
}

#[derive(Debug, Default)]
struct MockState {
    steps: HashMap<usize, VecDeque<MockStep>>,
    fallback: HashMap<usize, Vec<SubtitleEntry>>,
    upload_failures: HashMap<usize, VecDeque<MockFailure>>,
    delays: HashMap<usize, Duration>,
    /// Remote file name to segment index
    files: HashMap<String, usize>,
    live: HashSet<String>,
    transcribe_calls: HashMap<usize, u32>,
    uploads: u32,
    deletes: u32,
    completion_order: Vec<usize>,
}

/// Mock transcriber with per-segment scripts
#[derive(Debug, Default)]
pub struct MockTranscriber {
    state: Mutex<MockState>,
}

impl MockTranscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript returned for `index` once its script is exhausted
    pub fn with_transcript(mut self, index: usize, entries: Vec<SubtitleEntry>) -> Self {
        self.state.get_mut().fallback.insert(index, entries);
        self
    }

    /// Steps consumed by successive `transcribe` calls for `index`
    pub fn with_steps(mut self, index: usize, steps: Vec<MockStep>) -> Self {
        self.state.get_mut().steps.insert(index, steps.into());
        self
    }

    /// Failures returned by successive `upload` calls for `index`
    pub fn with_upload_failures(mut self, index: usize, failures: Vec<MockFailure>) -> Self {
        self.state.get_mut().upload_failures.insert(index, failures.into());
        self
    }

    /// Simulated latency of `transcribe` for `index`
    pub fn with_delay(mut self, index: usize, delay: Duration) -> Self {
        self.state.get_mut().delays.insert(index, delay);
        self
    }

    pub fn upload_count(&self) -> u32 {
        self.state.lock().uploads
    }

    pub fn delete_count(&self) -> u32 {
        self.state.lock().deletes
    }

    /// Uploaded files that were never deleted
    pub fn live_files(&self) -> usize {
        self.state.lock().live.len()
    }

    pub fn transcribe_calls(&self, index: usize) -> u32 {
        self.state.lock().transcribe_calls.get(&index).copied().unwrap_or(0)
    }

    /// Segment indices in the order their transcriptions finished
    pub fn completion_order(&self) -> Vec<usize> {
        self.state.lock().completion_order.clone()
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn upload(&self, segment: &AudioSegment) -> Result<RemoteFile, ProviderError> {
        let mut state = self.state.lock();
        if let Some(failure) = state
            .upload_failures
            .get_mut(&segment.index)
            .and_then(|queue| queue.pop_front())
        {
            return Err(failure.to_error());
        }

        state.uploads += 1;
        let name = format!("files/mock-{}-{}", segment.index, state.uploads);
        state.files.insert(name.clone(), segment.index);
        state.live.insert(name.clone());

        Ok(RemoteFile {
            uri: format!("mock://{}", name),
            name,
            mime_type: "audio/wav".to_string(),
        })
    }

    async fn transcribe(&self, file: &RemoteFile) -> Result<Vec<SubtitleEntry>, ProviderError> {
        let (index, delay) = {
            let mut state = self.state.lock();
            let index = state
                .files
                .get(&file.name)
                .copied()
                .ok_or_else(|| ProviderError::RequestFailed(format!("Unknown file {}", file.name)))?;
            *state.transcribe_calls.entry(index).or_insert(0) += 1;
            (index, state.delays.get(&index).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let step = state.steps.get_mut(&index).and_then(|queue| queue.pop_front());
        let result = match step {
            Some(MockStep::Transcript(entries)) => Ok(entries),
            Some(MockStep::Fail(failure)) => Err(failure.to_error()),
            None => Ok(state.fallback.get(&index).cloned().unwrap_or_default()),
        };
        if result.is_ok() {
            state.completion_order.push(index);
        }
        result
    }

    async fn delete(&self, file: &RemoteFile) -> Result<(), ProviderError> {
        let mut state = self.state.lock();
        state.deletes += 1;
        if state.live.remove(&file.name) {
            Ok(())
        } else {
            Err(ProviderError::RequestFailed(format!("File {} does not exist", file.name)))
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
