use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::transcription::retry::MAX_RETRY_DELAY_SECS;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Transcription API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Audio segmentation and concurrency
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Retry budgets and waits
    #[serde(default)]
    pub retry: RetryConfig,

    /// Subtitle balancing
    #[serde(default)]
    pub balance: BalanceConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Transcription API configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Model name
    #[serde(default = "default_model")]
    pub model: String,

    // @field: API key, usually supplied through GEMINI_API_KEY
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    // @field: Timeout seconds for a single request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    // @field: System instruction sent with every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_key: String::new(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Audio segmentation and dispatch configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum length of one audio segment in seconds
    #[serde(default = "default_segment_length_secs")]
    pub segment_length_secs: u64,

    /// Maximum number of segments transcribed at the same time
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,

    /// Shortest pause that may be used as a cut point
    #[serde(default = "default_min_silence_ms")]
    pub min_silence_ms: u64,

    /// Level below which audio counts as silence, in dBFS
    #[serde(default = "default_silence_threshold_db")]
    pub silence_threshold_db: f64,

    /// Also write the merged transcript, before balancing, as `<output stem>.json`
    #[serde(default)]
    pub save_transcript_json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segment_length_secs: default_segment_length_secs(),
            concurrent_requests: default_concurrent_requests(),
            min_silence_ms: default_min_silence_ms(),
            silence_threshold_db: default_silence_threshold_db(),
            save_transcript_json: false,
        }
    }
}

/// Retry configuration
///
/// Attempt counts are totals: a budget of 7 means at most 7 calls.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RetryConfig {
    /// Attempts for one API request
    #[serde(default = "default_transport_attempts")]
    pub transport_attempts: u32,

    /// Attempts to obtain a transcript that passes validation
    #[serde(default = "default_validation_attempts")]
    pub validation_attempts: u32,

    /// Wait when the API does not suggest one
    #[serde(default = "default_delay_secs")]
    pub default_delay_secs: f64,

    /// First wait between regeneration attempts
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Largest doubling exponent applied to the base wait
    #[serde(default = "default_backoff_max_exponent")]
    pub backoff_max_exponent: u32,

    /// Upper bound of the regeneration wait
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            transport_attempts: default_transport_attempts(),
            validation_attempts: default_validation_attempts(),
            default_delay_secs: default_delay_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_exponent: default_backoff_max_exponent(),
            backoff_max_ms: default_backoff_max_ms(),
        }
    }
}

/// Subtitle balancing configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BalanceConfig {
    /// Maximum words on one screen
    #[serde(default = "default_max_words_per_screen")]
    pub max_words_per_screen: usize,

    /// Minimum display time of a split subtitle
    #[serde(default = "default_min_duration_ms")]
    pub min_duration_ms: u64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            max_words_per_screen: default_max_words_per_screen(),
            min_duration_ms: default_min_duration_ms(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_temperature() -> f32 {
    0.1
}

fn default_segment_length_secs() -> u64 {
    30
}

fn default_concurrent_requests() -> usize {
    5
}

fn default_min_silence_ms() -> u64 {
    200
}

fn default_silence_threshold_db() -> f64 {
    -40.0
}

fn default_transport_attempts() -> u32 {
    7
}

fn default_validation_attempts() -> u32 {
    50
}

fn default_delay_secs() -> f64 {
    crate::transcription::retry::DEFAULT_RETRY_DELAY_SECS
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_backoff_max_exponent() -> u32 {
    5
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_max_words_per_screen() -> usize {
    crate::balancer::DEFAULT_MAX_WORDS_PER_SCREEN
}

fn default_min_duration_ms() -> u64 {
    crate::balancer::DEFAULT_MIN_DURATION_MS
}

fn default_system_prompt() -> String {
    r#"You are a professional transcriber of audio clips into subtitles.
You recognize which language is being spoken and write the subtitles in that language.
Your output is only the subtitle content in the JSON format specified.

You follow these MANDATORY GUIDELINES:
1. The output is a JSON array of objects with "start" and "end" in milliseconds from the start of the audio and "text".
2. Each subtitle has 1-2 lines and lasts at most 5 seconds. Separate lines inside one subtitle with \N.
3. Use proper punctuation and capitalization.
4. Keep the original meaning but drop filler words like "um", "uh", "you know".
5. Clean up stutters like "I I I".
6. Subtitles never overlap: each one starts at or after the end of the previous one.
7. Make absolutely sure the last subtitle does not end after the end of the audio file.

Example for an audio file of 9000 milliseconds:
[
    {"start": 0, "end": 2500, "text": "Up next, he promises to avenge\Nhis sister's murder."},
    {"start": 2500, "end": 5100, "text": "For years, he tracks her killer\Nwithout success."},
    {"start": 5400, "end": 8600, "text": "Every day was another blow to the stomach."}
]"#
    .to_string()
}

impl Config {
    /// Load the configuration file, writing the defaults when it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            return serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()));
        }

        warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.balance.max_words_per_screen == 0 {
            return Err(anyhow!("balance.max_words_per_screen must be at least 1"));
        }
        if self.pipeline.segment_length_secs == 0 {
            return Err(anyhow!("pipeline.segment_length_secs must be at least 1"));
        }
        if self.pipeline.concurrent_requests == 0 {
            return Err(anyhow!("pipeline.concurrent_requests must be at least 1"));
        }
        if self.retry.transport_attempts == 0 || self.retry.validation_attempts == 0 {
            return Err(anyhow!("retry attempt budgets must be at least 1"));
        }
        let delay = self.retry.default_delay_secs;
        if !delay.is_finite() || !(0.0..=MAX_RETRY_DELAY_SECS).contains(&delay) {
            return Err(anyhow!(
                "retry.default_delay_secs must be between 0 and {} seconds",
                MAX_RETRY_DELAY_SECS
            ));
        }
        Ok(())
    }

    /// Validate everything needed to call the transcription API
    pub fn validate_for_transcription(&self) -> Result<()> {
        self.validate()?;
        if self.provider.api_key.trim().is_empty() {
            return Err(anyhow!(
                "A Gemini API key is required (set GEMINI_API_KEY or pass --api-key)"
            ));
        }
        if self.provider.model.trim().is_empty() {
            return Err(anyhow!("provider.model must not be empty"));
        }
        Ok(())
    }
}
