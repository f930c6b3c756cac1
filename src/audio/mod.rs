/*!
 * Audio handling for transcription.
 *
 * - `extract`: decodes the audio stream of a media file through ffmpeg
 * - `segmenter`: cuts decoded audio into bounded segments at pauses
 *
 * All audio is kept as 16-bit mono PCM.
 */

use std::io::Cursor;

use anyhow::{Context, Result};
use bytes::Bytes;

pub mod extract;
pub mod segmenter;

pub use extract::extract_audio;
pub use segmenter::{split_audio, SegmenterConfig};

/// Sample rate audio is decoded to
pub const SAMPLE_RATE: u32 = 16_000;

/// Whole decoded audio stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioTrack {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioTrack {
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_ms(&self) -> u64 {
        samples_to_ms(self.samples.len(), self.sample_rate)
    }
}

/// A bounded span of the source audio, transcribed on its own
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSegment {
    /// Position in the segment sequence
    pub index: usize,
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Declared length, the offset the next segment starts at
    pub duration_ms: u64,
}

impl AudioSegment {
    pub fn new(index: usize, samples: Vec<i16>, sample_rate: u32) -> Self {
        let duration_ms = samples_to_ms(samples.len(), sample_rate);
        Self {
            index,
            samples,
            sample_rate,
            duration_ms,
        }
    }

    /// Encode as a 16-bit mono WAV file in memory
    pub fn to_wav_bytes(&self) -> Result<Bytes> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Vec::with_capacity(44 + self.samples.len() * 2);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)
                .context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer.write_sample(sample).context("Failed to write WAV sample")?;
            }
            writer.finalize().context("Failed to finalize WAV data")?;
        }

        Ok(Bytes::from(buffer))
    }
}

/// `floor(samples * 1000 / rate)`
pub fn samples_to_ms(samples: usize, sample_rate: u32) -> u64 {
    if sample_rate == 0 {
        return 0;
    }
    (samples as u64 * 1000) / sample_rate as u64
}
