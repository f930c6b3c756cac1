/*!
 * Assembly of per-segment transcripts into one timeline.
 *
 * Every segment transcript is relative to the start of its own audio. The
 * merge shifts each transcript by the summed declared durations of the
 * segments before it, so a transcript that stops early never drags the
 * following segments backwards.
 */

use log::debug;

use crate::errors::TimelineError;
use crate::subtitle_processor::SubtitleEntry;
use crate::validation::validate_subtitles;

/// Merge segment transcripts into a single validated timeline
///
/// `groups[i]` is the transcript of segment `i` and `durations_ms[i]` its
/// declared length. The result is validated against the sum of all durations;
/// nothing is returned when validation fails.
pub fn merge_subtitle_events(
    groups: Vec<Vec<SubtitleEntry>>,
    durations_ms: &[u64],
) -> Result<Vec<SubtitleEntry>, TimelineError> {
    if groups.is_empty() || durations_ms.is_empty() {
        return Err(TimelineError::Precondition(
            "at least one segment is required".to_string(),
        ));
    }
    if groups.len() != durations_ms.len() {
        return Err(TimelineError::Precondition(format!(
            "{} transcripts but {} segment durations",
            groups.len(),
            durations_ms.len()
        )));
    }

    let mut merged = Vec::with_capacity(groups.iter().map(Vec::len).sum());
    let mut offset_ms: u64 = 0;

    for (group, duration_ms) in groups.into_iter().zip(durations_ms) {
        merged.extend(group.into_iter().map(|entry| entry.shifted(offset_ms)));
        offset_ms += duration_ms;
    }

    validate_subtitles(&merged, offset_ms)?;

    for (i, entry) in merged.iter_mut().enumerate() {
        entry.seq_num = i + 1;
    }

    debug!("Merged {} subtitles over {}ms", merged.len(), offset_ms);
    Ok(merged)
}
