/*!
 * Common test utilities for the subtool test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use subtool::audio::AudioTrack;
use subtool::subtitle_processor::SubtitleEntry;

/// Sample rate of synthetic tracks; one sample per millisecond
pub const TEST_SAMPLE_RATE: u32 = 1000;

/// Route library logs to the test output, ignoring repeated initialization
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Creates a sample subtitle file with one long entry
pub fn create_test_subtitle(dir: &Path, filename: &str) -> Result<PathBuf> {
    let content = r#"1
00:00:01,000 --> 00:00:04,000
This is a test subtitle.

2
00:00:05,000 --> 00:00:15,000
one two three four five six seven eight nine ten eleven twelve thirteen fourteen

3
00:00:16,000 --> 00:00:19,000
<i>For testing</i> purposes.
"#;
    create_test_file(dir, filename, content)
}

/// Subtitle entry without a sequence number
pub fn entry(start_ms: u64, end_ms: u64, text: &str) -> SubtitleEntry {
    SubtitleEntry::new(0, start_ms, end_ms, text.to_string())
}

/// `(start, end)` pairs of a timeline
pub fn spans(entries: &[SubtitleEntry]) -> Vec<(u64, u64)> {
    entries.iter().map(|e| (e.start_time_ms, e.end_time_ms)).collect()
}

/// Track of alternating speech and pauses, durations in milliseconds
///
/// Speech is a square wave well above the silence threshold, pauses are
/// digital silence.
pub fn speech_track(parts: &[(u64, bool)]) -> AudioTrack {
    let mut samples = Vec::new();
    for &(duration_ms, speech) in parts {
        let count = (duration_ms * TEST_SAMPLE_RATE as u64 / 1000) as usize;
        samples.extend((0..count).map(|i| match (speech, i % 2) {
            (false, _) => 0,
            (true, 0) => 6000,
            (true, _) => -6000,
        }));
    }
    AudioTrack::new(samples, TEST_SAMPLE_RATE)
}
