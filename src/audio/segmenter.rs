/*!
 * Silence based audio segmentation.
 *
 * The track is scanned in 10 ms frames. Pauses of at least `min_silence_ms`
 * below the silence threshold become cut candidates, cut at their middle so
 * that both neighbours keep some of the pause. The resulting chunks are then
 * packed greedily into segments shorter than the segment length.
 */

use log::debug;

use crate::app_config::PipelineConfig;

use super::{samples_to_ms, AudioSegment, AudioTrack};

const FRAME_MS: u64 = 10;

/// Parameters of the segmenter
#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    pub segment_length_ms: u64,
    pub min_silence_ms: u64,
    pub silence_threshold_db: f64,
}

impl From<&PipelineConfig> for SegmenterConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            segment_length_ms: config.segment_length_secs * 1000,
            min_silence_ms: config.min_silence_ms,
            silence_threshold_db: config.silence_threshold_db,
        }
    }
}

/// RMS level of a frame relative to full scale, 0.0 for an empty frame
pub fn calculate_rms(samples: &[i16]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt()
}

/// Level in dBFS, negative infinity for digital silence
pub fn dbfs(samples: &[i16]) -> f64 {
    let rms = calculate_rms(samples);
    if rms == 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

/// Split a track into ordered segments no longer than the segment length
///
/// The segments are contiguous and together hold every sample of the track.
pub fn split_audio(track: &AudioTrack, config: &SegmenterConfig) -> Vec<AudioSegment> {
    let total = track.samples.len();
    if total == 0 || track.sample_rate == 0 {
        return Vec::new();
    }

    let frame_len = ((track.sample_rate as u64 * FRAME_MS / 1000) as usize).max(1);
    let max_len = ((config.segment_length_ms * track.sample_rate as u64 / 1000) as usize).max(1);

    let cuts = silence_cut_points(track, config, frame_len);

    let mut chunks: Vec<(usize, usize)> = Vec::with_capacity(cuts.len() + 1);
    let mut chunk_start = 0;
    for cut in cuts.into_iter().chain(std::iter::once(total)) {
        let mut start = chunk_start;
        while cut - start > max_len {
            chunks.push((start, start + max_len));
            start += max_len;
        }
        if cut > start {
            chunks.push((start, cut));
        }
        chunk_start = cut;
    }

    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    for (start, end) in chunks {
        current = match current {
            Some((seg_start, seg_end)) if (seg_end - seg_start) + (end - start) < max_len => {
                Some((seg_start, end))
            }
            Some(segment) => {
                bounds.push(segment);
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some(segment) = current {
        bounds.push(segment);
    }

    let segments: Vec<AudioSegment> = bounds
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            AudioSegment::new(index, track.samples[start..end].to_vec(), track.sample_rate)
        })
        .collect();

    debug!(
        "Split {}ms of audio into {} segments",
        samples_to_ms(total, track.sample_rate),
        segments.len()
    );
    segments
}

/// Sample positions in the middle of every long enough pause
fn silence_cut_points(track: &AudioTrack, config: &SegmenterConfig, frame_len: usize) -> Vec<usize> {
    let total = track.samples.len();
    let min_frames = (config.min_silence_ms.div_ceil(FRAME_MS) as usize).max(1);

    let silent: Vec<bool> = track
        .samples
        .chunks(frame_len)
        .map(|frame| dbfs(frame) < config.silence_threshold_db)
        .collect();

    let mut cuts = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, is_silent) in silent.iter().copied().chain(std::iter::once(false)).enumerate() {
        match (is_silent, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                if i - start >= min_frames {
                    let cut = ((start + i) * frame_len / 2).min(total);
                    if cut > 0 && cut < total {
                        cuts.push(cut);
                    }
                }
                run_start = None;
            }
            _ => {}
        }
    }

    cuts
}
