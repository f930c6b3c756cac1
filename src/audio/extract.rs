use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

use super::{AudioTrack, SAMPLE_RATE};

// @module: Audio extraction through ffprobe/ffmpeg

const FFPROBE_TIMEOUT: Duration = Duration::from_secs(60);
const FFMPEG_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Information about an audio stream of a media file
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStreamInfo {
    pub index: usize,
    pub codec_name: String,
    pub channels: Option<u64>,
    pub sample_rate: Option<String>,
}

/// Decode the first audio stream of `path` to 16 kHz mono PCM
pub async fn extract_audio<P: AsRef<Path>>(path: P) -> Result<AudioTrack> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(anyhow!("Input file does not exist: {:?}", path));
    }

    let streams = list_audio_streams(path).await?;
    let stream = streams
        .first()
        .ok_or_else(|| anyhow!("No audio streams found in {}", path.display()))?;
    info!(
        "Extracting audio stream {} ({}) from {}",
        stream.index,
        stream.codec_name,
        path.display()
    );

    let path_arg = path
        .to_str()
        .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))?;
    let sample_rate = SAMPLE_RATE.to_string();
    let ffmpeg_future = Command::new("ffmpeg")
        .args([
            "-nostdin",
            "-i", path_arg,
            "-map", "0:a:0",
            "-vn",
            "-ac", "1",
            "-ar", sample_rate.as_str(),
            "-f", "s16le",
            "-acodec", "pcm_s16le",
            "pipe:1",
        ])
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        result = ffmpeg_future => {
            result.map_err(|e| anyhow!("Failed to execute ffmpeg command for audio extraction: {}", e))?
        },
        _ = tokio::time::sleep(FFMPEG_TIMEOUT) => {
            return Err(anyhow!("ffmpeg command timed out after {} minutes", FFMPEG_TIMEOUT.as_secs() / 60));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let filtered = filter_ffmpeg_stderr(&stderr);
        error!("Audio extraction failed: {}", filtered);
        return Err(anyhow!("ffmpeg extraction failed: {}", filtered));
    }

    let samples = decode_pcm_s16le(&output.stdout);
    let track = AudioTrack::new(samples, SAMPLE_RATE);
    debug!("Decoded {} samples ({}ms)", track.samples.len(), track.duration_ms());
    Ok(track)
}

/// List the audio streams of a media file with ffprobe
pub async fn list_audio_streams(path: &Path) -> Result<Vec<AudioStreamInfo>> {
    let path_arg = path
        .to_str()
        .ok_or_else(|| anyhow!("Path is not valid UTF-8: {:?}", path))?;
    let ffprobe_future = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-select_streams", "a",
            path_arg,
        ])
        .kill_on_drop(true)
        .output();

    let output = tokio::select! {
        result = ffprobe_future => {
            result.map_err(|e| anyhow!("Failed to execute ffprobe command: {}", e))?
        },
        _ = tokio::time::sleep(FFPROBE_TIMEOUT) => {
            return Err(anyhow!("ffprobe command timed out after 60 seconds"));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("ffprobe command failed: {}", stderr.trim()));
    }

    parse_audio_streams(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ffprobe's `-show_streams` JSON output
pub fn parse_audio_streams(json: &str) -> Result<Vec<AudioStreamInfo>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(json).context("Failed to parse ffprobe JSON output")?;
    let streams = value
        .get("streams")
        .and_then(|s| s.as_array())
        .map(|streams| {
            streams
                .iter()
                .filter(|s| s.get("codec_type").and_then(|t| t.as_str()).unwrap_or("audio") == "audio")
                .map(|s| AudioStreamInfo {
                    index: s.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
                    codec_name: s
                        .get("codec_name")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown")
                        .to_string(),
                    channels: s.get("channels").and_then(|v| v.as_u64()),
                    sample_rate: s.get("sample_rate").and_then(|v| v.as_str()).map(str::to_string),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(streams)
}

/// Little-endian 16-bit PCM to samples; a trailing odd byte is dropped
pub fn decode_pcm_s16le(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Filter ffmpeg stderr to only show meaningful error lines, stripping the
/// version banner, build configuration, and stream metadata noise.
fn filter_ffmpeg_stderr(stderr: &str) -> String {
    let noise_prefixes = [
        "ffmpeg version",
        "built with",
        "configuration:",
        "lib",
        "Input #",
        "Metadata:",
        "Duration:",
        "Chapter",
        "Stream #",
        "Output #",
        "Stream mapping:",
        "Press [q]",
    ];

    let meaningful: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !noise_prefixes.iter().any(|p| line.starts_with(p)))
        .collect();

    if meaningful.is_empty() {
        "unknown ffmpeg error (stderr was empty after filtering)".to_string()
    } else {
        meaningful.join("\n")
    }
}
