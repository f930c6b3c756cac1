/*!
 * End-to-end tests of the transcription pipeline against the mock provider
 */

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use subtool::app_config::Config;
use subtool::app_controller::Controller;
use subtool::audio::{split_audio, AudioSegment, AudioTrack, SegmenterConfig};
use subtool::errors::{ProviderError, TranscriptionError};
use subtool::providers::mock::{MockFailure, MockStep, MockTranscriber};
use subtool::subtitle_processor::SubtitleCollection;
use subtool::transcription::{BatchTranscriber, RunOutcome, TranscriptionService};
use crate::common::{self, entry, spans, TEST_SAMPLE_RATE};

fn test_config() -> Config {
    let mut config = Config::default();
    config.pipeline.segment_length_secs = 1;
    config.pipeline.concurrent_requests = 2;
    config.retry.transport_attempts = 3;
    config.retry.validation_attempts = 3;
    config.retry.default_delay_secs = 0.5;
    config.retry.backoff_base_ms = 10;
    config.retry.backoff_max_ms = 100;
    config.balance.max_words_per_screen = 3;
    config.balance.min_duration_ms = 10;
    config
}

fn test_track() -> AudioTrack {
    common::speech_track(&[(900, true), (300, false), (900, true), (300, false), (900, true)])
}

fn test_segments(config: &Config, track: &AudioTrack) -> Vec<AudioSegment> {
    split_audio(track, &SegmenterConfig::from(&config.pipeline))
}

/// One subtitle per segment, covering the whole segment
fn scripted_mock(segments: &[AudioSegment], text: impl Fn(usize) -> String) -> MockTranscriber {
    segments.iter().fold(MockTranscriber::new(), |mock, segment| {
        mock.with_transcript(segment.index, vec![entry(0, segment.duration_ms, &text(segment.index))])
    })
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_shouldWriteMergedTimeline() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("movie.srt");
    let config = test_config();
    let track = test_track();
    let segments = test_segments(&config, &track);
    assert!(segments.len() > 1);
    let mock = Arc::new(scripted_mock(&segments, |i| format!("segment {}", i)));
    let controller = Controller::with_config(config)?;

    let outcome = controller
        .transcribe_track(mock.clone(), track.clone(), &temp_dir.path().join("movie.mkv"), &output, &CancellationToken::new())
        .await?;

    assert_eq!(outcome, RunOutcome::Completed(output.clone()));
    let written = SubtitleCollection::from_srt_file(&output)?;
    let mut offset = 0;
    let expected: Vec<(u64, u64)> = segments
        .iter()
        .map(|segment| {
            let span = (offset, offset + segment.duration_ms);
            offset += segment.duration_ms;
            span
        })
        .collect();
    assert_eq!(spans(&written.entries), expected);
    assert_eq!(written.entries[1].text, "segment 1");
    assert_eq!(offset, track.duration_ms());
    assert_eq!(mock.live_files(), 0);
    assert!(!temp_dir.path().join("movie.json").exists());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_withSaveTranscriptJson_shouldWriteUnbalancedTranscript() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("movie.srt");
    let mut config = test_config();
    config.pipeline.save_transcript_json = true;
    let track = test_track();
    let segments = test_segments(&config, &track);
    let mock = Arc::new(scripted_mock(&segments, |_| "one two three four five six".to_string()));
    let controller = Controller::with_config(config)?;

    controller
        .transcribe_track(mock.clone(), track, &temp_dir.path().join("movie.mkv"), &output, &CancellationToken::new())
        .await?;

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(temp_dir.path().join("movie.json"))?)?;
    let transcript = json.as_array().cloned().unwrap_or_default();
    assert_eq!(transcript.len(), segments.len());
    assert_eq!(transcript[0]["start"], 0);
    assert_eq!(transcript[0]["text"], "one two three four five six");
    assert_eq!(transcript[1]["start"], segments[0].duration_ms);
    assert_eq!(SubtitleCollection::from_srt_file(&output)?.entries.len(), segments.len() * 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_shouldBalanceAndBackUpPreviousOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = common::create_test_file(temp_dir.path(), "movie.srt", "previous run")?;
    let config = test_config();
    let track = test_track();
    let segments = test_segments(&config, &track);
    let mock = Arc::new(scripted_mock(&segments, |_| "one two three four five six".to_string()));
    let controller = Controller::with_config(config)?;

    controller
        .transcribe_track(mock.clone(), track, &temp_dir.path().join("movie.mkv"), &output, &CancellationToken::new())
        .await?;

    let written = SubtitleCollection::from_srt_file(&output)?;
    assert_eq!(written.entries.len(), segments.len() * 2);
    assert!(written.entries.iter().all(|e| e.text.split_whitespace().count() == 3));
    assert_eq!(fs::read_to_string(temp_dir.path().join("movie.srt.bak"))?, "previous run");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_withInvalidThenValidTranscript_shouldRegenerate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("movie.srt");
    let config = test_config();
    let track = test_track();
    let segments = test_segments(&config, &track);
    let too_long = segments[0].duration_ms + 500;
    let mock = Arc::new(
        scripted_mock(&segments, |i| format!("segment {}", i))
            .with_steps(0, vec![MockStep::Transcript(vec![entry(0, too_long, "too long")])]),
    );
    let controller = Controller::with_config(config)?;

    controller
        .transcribe_track(mock.clone(), track, &temp_dir.path().join("movie.mkv"), &output, &CancellationToken::new())
        .await?;

    assert_eq!(mock.transcribe_calls(0), 2);
    assert_eq!(mock.transcribe_calls(1), 1);
    assert_eq!(mock.live_files(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_withDailyQuota_shouldFailWithSegmentIndex() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("movie.srt");
    let config = test_config();
    let track = test_track();
    let segments = test_segments(&config, &track);
    let mock = Arc::new(
        scripted_mock(&segments, |i| format!("segment {}", i))
            .with_steps(1, vec![MockStep::Fail(MockFailure::DailyQuota)]),
    );
    let controller = Controller::with_config(config)?;

    let error = controller
        .transcribe_track(mock.clone(), track, &temp_dir.path().join("movie.mkv"), &output, &CancellationToken::new())
        .await
        .unwrap_err();

    let transcription_error = error.downcast_ref::<TranscriptionError>().unwrap();
    assert!(matches!(transcription_error, TranscriptionError::Segment { index: 1, .. }));
    assert!(matches!(
        transcription_error.root(),
        TranscriptionError::Provider(ProviderError::ApiError { status_code: 429, .. })
    ));
    assert_eq!(mock.transcribe_calls(1), 1);
    assert_eq!(mock.live_files(), 0);
    assert!(!output.exists());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_withCancelledToken_shouldAbortWithoutOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let output = temp_dir.path().join("movie.srt");
    let config = test_config();
    let track = test_track();
    let segments = test_segments(&config, &track);
    let mock = Arc::new(scripted_mock(&segments, |i| format!("segment {}", i)));
    let controller = Controller::with_config(config)?;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = controller
        .transcribe_track(mock.clone(), track, &temp_dir.path().join("movie.mkv"), &output, &cancel)
        .await?;

    assert!(outcome.is_aborted());
    assert!(!output.exists());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeTrack_withEmptyTrack_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let controller = Controller::with_config(test_config())?;

    let result = controller
        .transcribe_track(
            Arc::new(MockTranscriber::new()),
            AudioTrack::new(Vec::new(), TEST_SAMPLE_RATE),
            &temp_dir.path().join("movie.mkv"),
            &temp_dir.path().join("movie.srt"),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeAll_withSlowMiddleSegment_shouldKeepSegmentOrder() -> Result<()> {
    let segments: Vec<AudioSegment> = (0..3)
        .map(|index| AudioSegment::new(index, vec![0; 1000], TEST_SAMPLE_RATE))
        .collect();
    let mock = Arc::new(
        scripted_mock(&segments, |i| format!("segment {}", i)).with_delay(1, Duration::from_secs(5)),
    );
    let service = TranscriptionService::new(mock.clone(), test_config().retry);
    let batch = BatchTranscriber::new(service, 2);

    let outcome = batch.transcribe_all(&segments, &CancellationToken::new(), |_, _| {}).await?;

    let entries = match outcome {
        RunOutcome::Completed(entries) => entries,
        RunOutcome::Aborted => panic!("run was not cancelled"),
    };
    assert_eq!(mock.completion_order(), vec![0, 2, 1]);
    assert_eq!(
        entries.iter().map(|e| e.text.as_str()).collect::<Vec<_>>(),
        vec!["segment 0", "segment 1", "segment 2"]
    );
    assert_eq!(spans(&entries), vec![(0, 1000), (1000, 2000), (2000, 3000)]);
    Ok(())
}

#[test]
fn test_runTranscriptionWith_withSubtitleOrMissingInput_shouldFailBeforeUpload() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let subtitle = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let mock = Arc::new(MockTranscriber::new());
    let controller = Controller::with_config(test_config())?;

    let (from_subtitle, from_missing) = tokio_test::block_on(async {
        let cancel = CancellationToken::new();
        let from_subtitle = controller
            .run_transcription_with(mock.clone(), &subtitle, None, &cancel)
            .await;
        let from_missing = controller
            .run_transcription_with(mock.clone(), &temp_dir.path().join("missing.mkv"), None, &cancel)
            .await;
        (from_subtitle, from_missing)
    });

    assert!(from_subtitle.unwrap_err().to_string().contains("balance"));
    assert!(from_missing.is_err());
    assert_eq!(mock.upload_count(), 0);
    Ok(())
}

fn even_segments(count: usize) -> Vec<AudioSegment> {
    (0..count)
        .map(|index| AudioSegment::new(index, vec![0; 1000], TEST_SAMPLE_RATE))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_transcribeAll_whenCancelledMidRun_shouldRemoveInFlightUploads() -> Result<()> {
    let segments = even_segments(3);
    let mock = Arc::new(
        (0..3).fold(scripted_mock(&segments, |i| format!("segment {}", i)), |mock, index| {
            mock.with_delay(index, Duration::from_secs(60))
        }),
    );
    let batch = BatchTranscriber::new(TranscriptionService::new(mock.clone(), test_config().retry), 2);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let outcome = batch.transcribe_all(&segments, &cancel, |_, _| {}).await?;

    assert!(outcome.is_aborted());
    assert_eq!(mock.upload_count(), 2);
    assert_eq!(mock.live_files(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcribeAll_withFatalError_shouldRemoveUploadsOfDroppedSegments() -> Result<()> {
    let segments = even_segments(3);
    let mock = Arc::new(
        scripted_mock(&segments, |i| format!("segment {}", i))
            .with_steps(0, vec![MockStep::Fail(MockFailure::DailyQuota)])
            .with_delay(0, Duration::from_secs(1))
            .with_delay(1, Duration::from_secs(60)),
    );
    let batch = BatchTranscriber::new(TranscriptionService::new(mock.clone(), test_config().retry), 2);

    let error = batch
        .transcribe_all(&segments, &CancellationToken::new(), |_, _| {})
        .await
        .unwrap_err();

    assert!(matches!(error, TranscriptionError::Segment { index: 0, .. }));
    assert_eq!(mock.upload_count(), 2);
    assert_eq!(mock.live_files(), 0);
    Ok(())
}
