use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::app_config::Config;
use crate::audio::{extract_audio, split_audio, AudioTrack, SegmenterConfig};
use crate::balancer::{BalanceReport, SubtitleBalancer};
use crate::file_utils::{FileManager, FileType};
use crate::providers::gemini::Gemini;
use crate::providers::Transcriber;
use crate::subtitle_processor::SubtitleCollection;
use crate::transcription::{BatchTranscriber, RunOutcome, TranscriptionService};

// @module: Application controller for subtitle generation

/// Main application controller
pub struct Controller {
    // @field: App configuration
    config: Config,
}

impl Controller {
    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn balancer(&self) -> SubtitleBalancer {
        SubtitleBalancer::new(self.config.balance.max_words_per_screen, self.config.balance.min_duration_ms)
    }

    /// Generate subtitles for a video or audio file with Gemini
    ///
    /// Returns the path of the written SRT file, or `Aborted` when `cancel`
    /// fired before the run finished.
    pub async fn run_transcription(
        &self,
        input_file: &Path,
        output_file: Option<PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome<PathBuf>> {
        self.config.validate_for_transcription()?;
        let provider = Gemini::new(&self.config.provider).context("Failed to create Gemini client")?;
        self.run_transcription_with(Arc::new(provider), input_file, output_file, cancel)
            .await
    }

    /// Same as `run_transcription` with an explicit provider
    pub async fn run_transcription_with(
        &self,
        provider: Arc<dyn Transcriber>,
        input_file: &Path,
        output_file: Option<PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome<PathBuf>> {
        let start_time = Instant::now();

        let file_type = FileManager::detect_file_type(input_file)?;
        if file_type == FileType::Subtitle {
            return Err(anyhow!(
                "{} is already a subtitle file, use the balance command instead",
                input_file.display()
            ));
        }
        if !file_type.has_audio() {
            warn!("Unrecognized file type, trying to read audio from {}", input_file.display());
        }

        let output_path = output_file.unwrap_or_else(|| FileManager::default_output_path(input_file, "srt"));

        let track = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(RunOutcome::Aborted),
            track = extract_audio(input_file) => track?,
        };
        info!("Audio extracted: {}", Self::format_duration(Duration::from_millis(track.duration_ms())));

        let outcome = self
            .transcribe_track(provider, track, input_file, &output_path, cancel)
            .await?;

        if let RunOutcome::Completed(path) = &outcome {
            info!(
                "Subtitle saved at {} (processed in {})",
                path.display(),
                Self::format_duration(start_time.elapsed())
            );
        }
        Ok(outcome)
    }

    /// Segment, transcribe, balance and write an already decoded track
    pub async fn transcribe_track(
        &self,
        provider: Arc<dyn Transcriber>,
        track: AudioTrack,
        source_file: &Path,
        output_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome<PathBuf>> {
        if track.samples.is_empty() {
            return Err(anyhow!("No audio decoded from {}", source_file.display()));
        }

        let segments = split_audio(&track, &SegmenterConfig::from(&self.config.pipeline));
        info!("Split audio into {} segments", segments.len());

        let service = TranscriptionService::new(provider, self.config.retry.clone());
        let batch = BatchTranscriber::new(service, self.config.pipeline.concurrent_requests);

        let progress_bar = ProgressBar::new(segments.len() as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(style.progress_chars("█▓▒░"));
        progress_bar.set_message("Transcribing");

        let pb = progress_bar.clone();
        let outcome = batch
            .transcribe_all(&segments, cancel, move |done, _total| pb.set_position(done as u64))
            .await;
        progress_bar.finish_and_clear();

        let entries = match outcome? {
            RunOutcome::Completed(entries) => entries,
            RunOutcome::Aborted => return Ok(RunOutcome::Aborted),
        };

        if self.config.pipeline.save_transcript_json {
            let transcript = SubtitleCollection::from_entries(source_file.to_path_buf(), entries.clone());
            let json_path = FileManager::default_output_path(output_path, "json");
            FileManager::write_to_file(&json_path, &transcript.to_json()?)?;
            info!("Transcript saved at {}", json_path.display());
        }

        let balanced = self.balancer().balance(&entries);
        info!("Balanced {} subtitles into {}", entries.len(), balanced.len());

        let collection = SubtitleCollection::from_entries(source_file.to_path_buf(), balanced);
        Self::save_subtitles(&collection, output_path)?;
        Ok(RunOutcome::Completed(output_path.to_path_buf()))
    }

    /// Rebalance an existing SRT file
    ///
    /// Writes to `output_file`, or over the input (after backing it up).
    pub fn balance_file(&self, input_file: &Path, output_file: Option<PathBuf>) -> Result<PathBuf> {
        let collection = SubtitleCollection::from_srt_file(input_file)?;
        let balanced = self.balancer().balance(&collection.entries);
        info!("Balanced {} subtitles into {}", collection.entries.len(), balanced.len());

        let output_path = output_file.unwrap_or_else(|| input_file.to_path_buf());
        let balanced = SubtitleCollection::from_entries(input_file.to_path_buf(), balanced);
        Self::save_subtitles(&balanced, &output_path)?;
        Ok(output_path)
    }

    /// Word statistics of an SRT file against the configured budget
    pub fn analyze_file(&self, input_file: &Path) -> Result<BalanceReport> {
        let collection = SubtitleCollection::from_srt_file(input_file)?;
        Ok(self.balancer().analyze(&collection.entries))
    }

    fn save_subtitles(collection: &SubtitleCollection, output_path: &Path) -> Result<()> {
        FileManager::backup_existing(output_path)?;
        collection
            .write_to_srt(output_path)
            .with_context(|| format!("Failed to write subtitles to {}", output_path.display()))
    }

    pub fn format_duration(duration: Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }
}
