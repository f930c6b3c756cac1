/*!
 * Tests for the subtitle balancer
 */

use subtool::balancer::{SubtitleBalancer, DEFAULT_MAX_WORDS_PER_SCREEN, DEFAULT_MIN_DURATION_MS};
use subtool::subtitle_processor::SubtitleEntry;
use crate::common::{entry, spans};

fn sample_timeline() -> Vec<SubtitleEntry> {
    vec![
        entry(0, 2_000, "Hi."),
        entry(2_000, 12_000, "So this is the part where we talk\\Nabout every single thing that happened\\Nduring the whole trip last summer"),
        entry(12_500, 20_000, "<i>one two three four five six seven eight nine ten eleven twelve thirteen</i>"),
        entry(21_000, 24_000, "Short again."),
    ]
}

#[test]
fn test_default_shouldUseDocumentedBudget() {
    let balancer = SubtitleBalancer::default();

    assert_eq!(balancer.max_words_per_screen(), DEFAULT_MAX_WORDS_PER_SCREEN);
    assert_eq!(balancer.min_duration_ms(), DEFAULT_MIN_DURATION_MS);
    assert_eq!(DEFAULT_MAX_WORDS_PER_SCREEN, 12);
    assert_eq!(DEFAULT_MIN_DURATION_MS, 1000);
}

#[test]
fn test_balance_withMixedTimeline_shouldRespectWordBudget() {
    let balancer = SubtitleBalancer::new(6, 1000);

    let balanced = balancer.balance(&sample_timeline());

    for piece in &balanced {
        assert!(
            SubtitleBalancer::count_words(&piece.text) <= 6,
            "piece over budget: {:?}",
            piece.text
        );
    }
}

#[test]
fn test_balance_withUnsplittableEntry_shouldOnlyExceedBudgetThere() {
    let balancer = SubtitleBalancer::new(0, 1000);
    let entries = vec![entry(0, 3000, "Supercalifragilistic")];

    let balanced = balancer.balance(&entries);

    // One word cannot be split further, so the entry stays whole and over budget.
    assert_eq!(balanced.len(), 1);
    assert_eq!(balanced[0].text, "Supercalifragilistic");
    assert_eq!(spans(&balanced), vec![(0, 3000)]);
}

#[test]
fn test_balance_shouldPreserveEndOfEverySplitEntry() {
    let balancer = SubtitleBalancer::new(5, 500);
    let timeline = sample_timeline();

    let balanced = balancer.balance(&timeline);

    for original in &timeline {
        let pieces: Vec<&SubtitleEntry> = balanced
            .iter()
            .filter(|p| p.start_time_ms >= original.start_time_ms && p.start_time_ms < original.end_time_ms)
            .collect();
        assert_eq!(pieces.first().map(|p| p.start_time_ms), Some(original.start_time_ms));
        assert_eq!(pieces.last().map(|p| p.end_time_ms), Some(original.end_time_ms));
    }
}

#[test]
fn test_balance_shouldKeepOrderAndContiguousPieces() {
    let balancer = SubtitleBalancer::new(5, 500);

    let balanced = balancer.balance(&sample_timeline());

    assert_eq!(balanced.first().map(|e| e.text.as_str()), Some("Hi."));
    assert_eq!(balanced.last().map(|e| e.text.as_str()), Some("Short again."));
    for pair in balanced.windows(2) {
        assert!(pair[1].start_time_ms >= pair[0].end_time_ms);
    }
    let numbers: Vec<usize> = balanced.iter().map(|e| e.seq_num).collect();
    assert_eq!(numbers, (1..=balanced.len()).collect::<Vec<_>>());
}

#[test]
fn test_balance_withTaggedText_shouldCountOnlyVisibleWords() {
    let balancer = SubtitleBalancer::new(3, 100);
    let entries = vec![entry(0, 900, "<b>a</b> <i>b</i> c")];

    let balanced = balancer.balance(&entries);

    assert_eq!(balanced.len(), 1);
    assert_eq!(balanced[0].text, entries[0].text);
    assert_eq!(spans(&balanced), vec![(0, 900)]);
}

#[test]
fn test_balance_withEqualThirds_shouldSplitSpanEvenly() {
    let balancer = SubtitleBalancer::new(2, 1000);
    let entries = vec![entry(0, 9000, "a b c d e f")];

    let balanced = balancer.balance(&entries);

    assert_eq!(spans(&balanced), vec![(0, 3000), (3000, 6000), (6000, 9000)]);
    assert_eq!(
        balanced.iter().map(|e| e.text.as_str()).collect::<Vec<_>>(),
        vec!["a b", "c d", "e f"]
    );
}

#[test]
fn test_splitText_withFittingLines_shouldKeepLineBreaks() {
    let pieces = SubtitleBalancer::split_text("one two\\Nthree four\\Nfive six", 4);

    assert_eq!(pieces, vec!["one two\\Nthree four".to_string(), "five six".to_string()]);
}

#[test]
fn test_analyze_withEverythingInBudget_shouldReportNothingOver() {
    let balancer = SubtitleBalancer::default();

    let report = balancer.analyze(&[entry(0, 1000, "a b c")]);

    assert!(report.over_budget.is_empty());
    assert_eq!(report.max_words, 3);
}

#[test]
fn test_analyze_withLongText_shouldTruncatePreview() {
    let balancer = SubtitleBalancer::new(2, 1000);
    let text = "word ".repeat(30);

    let report = balancer.analyze(&[entry(0, 1000, text.trim())]);

    let preview = &report.over_budget[0].preview;
    assert!(preview.ends_with("..."));
    assert_eq!(preview.chars().count(), 53);
}

#[test]
fn test_balance_withTenWordsAndBudgetFive_shouldSplitInHalves() {
    let balancer = SubtitleBalancer::new(5, 1000);
    let entries = vec![entry(0, 10_000, "one two three four five six seven eight nine ten")];

    let balanced = balancer.balance(&entries);

    assert_eq!(spans(&balanced), vec![(0, 5_000), (5_000, 10_000)]);
    assert_eq!(balanced[0].text, "one two three four five");
    assert_eq!(balanced[1].text, "six seven eight nine ten");
}
