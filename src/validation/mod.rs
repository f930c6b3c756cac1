/*!
 * Validation of subtitle timelines.
 *
 * - `timecodes`: ordering, overlap and duration bound checks
 */

pub mod timecodes;

// Re-export main types
pub use timecodes::validate_subtitles;
