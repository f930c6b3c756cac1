/*!
 * Tests for merging segment transcripts into one timeline
 */

use subtool::errors::{TimelineError, ValidationError};
use subtool::timeline::merge_subtitle_events;
use crate::common::{entry, spans};

#[test]
fn test_merge_shouldOffsetEveryGroupBySumOfPreviousDurations() {
    let durations = [4_321, 10_000, 7, 2_500];
    let groups = vec![
        vec![entry(0, 100, "a"), entry(4_000, 4_321, "b")],
        vec![entry(10, 20, "c")],
        vec![],
        vec![entry(0, 2_500, "d")],
    ];

    let merged = merge_subtitle_events(groups, &durations).unwrap();

    assert_eq!(
        spans(&merged),
        vec![(0, 100), (4_000, 4_321), (4_331, 4_341), (14_328, 16_828)]
    );
    for pair in merged.windows(2) {
        assert!(pair[1].start_time_ms >= pair[0].end_time_ms);
    }
    assert!(merged.last().map(|e| e.end_time_ms).unwrap_or(0) <= durations.iter().sum::<u64>());
}

#[test]
fn test_merge_withEarlyStoppingTranscript_shouldAnchorNextSegmentToDeclaredDuration() {
    let groups = vec![vec![entry(0, 1_000, "stops early")], vec![entry(0, 500, "next")]];

    let merged = merge_subtitle_events(groups, &[30_000, 30_000]).unwrap();

    assert_eq!(merged[1].start_time_ms, 30_000);
}

#[test]
fn test_merge_withEntryPastTotal_shouldFailWithoutPartialResult() {
    let groups = vec![vec![entry(0, 900, "a")], vec![entry(0, 1_500, "b")]];

    let result = merge_subtitle_events(groups, &[1_000, 1_000]);

    assert!(matches!(
        result,
        Err(TimelineError::Validation(ValidationError::EndsAfterDuration { end_ms: 2_500, duration_ms: 2_000, .. }))
    ));
}
