/*!
 * # subtool - subtitles from audio with Google Gemini
 *
 * A Rust library for generating subtitles from the audio of video files.
 *
 * ## Features
 *
 * - Extract and decode the audio stream of a video or audio file
 * - Cut the audio into bounded segments at pauses
 * - Transcribe segments concurrently with Gemini, retrying quota and
 *   server errors and regenerating transcripts with broken timing
 * - Merge segment transcripts into one validated timeline
 * - Split long subtitles so each screen stays readable
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `audio`: Audio extraction and segmentation
 * - `providers`: Transcription API clients:
 *   - `providers::gemini`: Google Gemini API client
 *   - `providers::mock`: Scripted client for tests
 * - `transcription`: Retry policies, per-segment transcription and the
 *   concurrent dispatcher
 * - `timeline`: Assembly of segment transcripts into one timeline
 * - `validation`: Timeline invariants
 * - `balancer`: Word budget per subtitle
 * - `subtitle_processor`: Subtitle entries and SRT handling
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod audio;
pub mod balancer;
pub mod errors;
pub mod file_utils;
pub mod providers;
pub mod subtitle_processor;
pub mod timeline;
pub mod transcription;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use balancer::SubtitleBalancer;
pub use errors::{ProviderError, TimelineError, TranscriptionError, ValidationError};
pub use subtitle_processor::{SubtitleCollection, SubtitleEntry};
pub use timeline::merge_subtitle_events;
pub use transcription::{BatchTranscriber, RunOutcome, TranscriptionService};
pub use validation::validate_subtitles;
