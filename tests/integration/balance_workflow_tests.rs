/*!
 * Tests for rebalancing and analyzing existing subtitle files
 */

use anyhow::Result;
use std::fs;

use subtool::app_config::Config;
use subtool::app_controller::Controller;
use subtool::balancer::SubtitleBalancer;
use subtool::subtitle_processor::SubtitleCollection;
use crate::common;

fn controller(max_words: usize) -> Result<Controller> {
    let mut config = Config::default();
    config.balance.max_words_per_screen = max_words;
    Controller::with_config(config)
}

#[test]
fn test_balanceFile_withOutputPath_shouldSplitLongEntryOnly() -> Result<()> {
    common::init_logging();
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let output = temp_dir.path().join("out").join("movie.balanced.srt");

    let written = controller(5)?.balance_file(&input, Some(output.clone()))?;

    assert_eq!(written, output);
    let entries = SubtitleCollection::from_srt_file(&output)?.entries;
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].text, "This is a test subtitle.");
    assert_eq!(entries[1].start_time_ms, 5_000);
    assert_eq!(entries[3].end_time_ms, 15_000);
    assert_eq!(entries[4].text, "<i>For testing</i> purposes.");
    for entry in &entries {
        assert!(SubtitleBalancer::count_words(&entry.text) <= 5);
    }
    assert!(input.exists());
    assert!(!temp_dir.path().join("movie.srt.bak").exists());
    Ok(())
}

#[test]
fn test_balanceFile_withoutOutputPath_shouldOverwriteInputAndKeepBackup() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let original = fs::read_to_string(&input)?;

    let written = controller(5)?.balance_file(&input, None)?;

    assert_eq!(written, input);
    assert_eq!(fs::read_to_string(temp_dir.path().join("movie.srt.bak"))?, original);
    assert_eq!(SubtitleCollection::from_srt_file(&input)?.entries.len(), 5);
    Ok(())
}

#[test]
fn test_balanceFile_withDefaultBudget_shouldSplitFourteenWords() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let output = temp_dir.path().join("balanced.srt");

    controller(12)?.balance_file(&input, Some(output.clone()))?;

    let entries = SubtitleCollection::from_srt_file(&output)?.entries;
    assert_eq!(entries.len(), 4);
    assert_eq!(
        entries.iter().map(|e| e.seq_num).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    Ok(())
}

#[test]
fn test_analyzeFile_shouldReportOverBudgetEntry() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let report = controller(12)?.analyze_file(&input)?;

    assert_eq!(report.total_entries, 3);
    assert_eq!(report.max_words, 14);
    assert_eq!(report.over_budget.len(), 1);
    assert_eq!(report.over_budget[0].seq_num, 2);
    assert_eq!(report.over_budget[0].word_count, 14);
    Ok(())
}

#[test]
fn test_balanceFile_withMissingInput_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    assert!(controller(5)?.balance_file(&temp_dir.path().join("missing.srt"), None).is_err());
    Ok(())
}
