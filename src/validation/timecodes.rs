/*!
 * Timeline validation for subtitle entries.
 *
 * A timeline is valid when:
 * - its last entry does not end after the audio it describes
 * - no entry starts after it ends
 * - no entry starts before the previous one ends (touching entries are fine)
 *
 * The same check guards each segment transcript against the segment's own
 * duration and the merged timeline against the total duration.
 */

use log::debug;

use crate::errors::ValidationError;
use crate::subtitle_processor::SubtitleEntry;

/// Validate `entries` against a timeline lasting `duration_ms`
///
/// The bound on the last entry is checked first. Time ranges and overlaps
/// are then checked in a single pass and the first violation is reported.
pub fn validate_subtitles(entries: &[SubtitleEntry], duration_ms: u64) -> Result<(), ValidationError> {
    if let Some(last) = entries.last() {
        if last.end_time_ms > duration_ms {
            return Err(ValidationError::EndsAfterDuration {
                end_ms: last.end_time_ms,
                end_ts: SubtitleEntry::format_timestamp(last.end_time_ms),
                duration_ms,
                duration_ts: SubtitleEntry::format_timestamp(duration_ms),
            });
        }
    }

    let mut previous_end: Option<u64> = None;
    for (index, entry) in entries.iter().enumerate() {
        if entry.start_time_ms > entry.end_time_ms {
            return Err(ValidationError::InvalidTimeRange {
                index,
                start_ms: entry.start_time_ms,
                end_ms: entry.end_time_ms,
            });
        }

        if let Some(previous_end_ms) = previous_end {
            if entry.start_time_ms < previous_end_ms {
                return Err(ValidationError::Overlap {
                    index,
                    start_ms: entry.start_time_ms,
                    previous_end_ms,
                });
            }
        }

        previous_end = Some(entry.end_time_ms);
    }

    debug!("Validated {} subtitles against {}ms", entries.len(), duration_ms);
    Ok(())
}
