/*!
 * Subtitle balancing.
 *
 * Long subtitles are split into several shorter ones so that no screen shows
 * more than a configured number of words. Each split subtitle keeps its
 * original time span: pieces get a share proportional to their word count,
 * floored to a minimum display time, and the last piece runs to the original
 * end.
 *
 * Subtitles are balanced independently of their neighbours. A piece floored
 * to the minimum display time may run past the original end time; this is
 * kept as is and only reported at debug level.
 */

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::{LINE_BREAK, SubtitleEntry};

// @const: Inline formatting tags such as <i> or <font color="...">
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Default maximum words shown on one screen
pub const DEFAULT_MAX_WORDS_PER_SCREEN: usize = 12;

/// Default minimum display time of a split piece
pub const DEFAULT_MIN_DURATION_MS: u64 = 1000;

const PREVIEW_CHARS: usize = 50;

/// Splits long subtitles into readable pieces
#[derive(Debug, Clone)]
pub struct SubtitleBalancer {
    max_words_per_screen: usize,
    min_duration_ms: u64,
}

/// A subtitle that exceeds the word budget
#[derive(Debug, Clone, PartialEq)]
pub struct OverBudgetEntry {
    pub seq_num: usize,
    pub word_count: usize,
    pub preview: String,
}

/// Word statistics over a subtitle list
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceReport {
    pub total_entries: usize,
    pub average_words: f64,
    pub max_words: usize,
    pub over_budget: Vec<OverBudgetEntry>,
}

impl Default for SubtitleBalancer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORDS_PER_SCREEN, DEFAULT_MIN_DURATION_MS)
    }
}

impl SubtitleBalancer {
    pub fn new(max_words_per_screen: usize, min_duration_ms: u64) -> Self {
        Self {
            max_words_per_screen,
            min_duration_ms,
        }
    }

    pub fn max_words_per_screen(&self) -> usize {
        self.max_words_per_screen
    }

    pub fn min_duration_ms(&self) -> u64 {
        self.min_duration_ms
    }

    /// Count displayed words, ignoring formatting tags and line break markers
    pub fn count_words(text: &str) -> usize {
        let clean = TAG_REGEX.replace_all(text, "");
        clean.replace(LINE_BREAK, " ").split_whitespace().count()
    }

    /// Split `text` into pieces of at most `max_words` words
    ///
    /// Whole lines are grouped first. A group that is still too long is
    /// split word by word, dropping its line breaks.
    pub fn split_text(text: &str, max_words: usize) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_words = 0;

        for line in text.split(LINE_BREAK) {
            let line_words = Self::count_words(line);
            if current_words + line_words > max_words && !current.is_empty() {
                groups.push(current.join(LINE_BREAK));
                current = vec![line];
                current_words = line_words;
            } else {
                current.push(line);
                current_words += line_words;
            }
        }
        if !current.is_empty() {
            groups.push(current.join(LINE_BREAK));
        }

        let mut pieces = Vec::with_capacity(groups.len());
        for group in groups {
            if Self::count_words(&group) <= max_words {
                pieces.push(group);
                continue;
            }

            let flattened = group.replace(LINE_BREAK, " ");
            let mut words: Vec<&str> = Vec::new();
            for word in flattened.split_whitespace() {
                if words.len() + 1 > max_words && !words.is_empty() {
                    pieces.push(words.join(" "));
                    words.clear();
                }
                words.push(word);
            }
            if !words.is_empty() {
                pieces.push(words.join(" "));
            }
        }

        pieces
    }

    /// Balance a timeline, renumbering the result from 1
    pub fn balance(&self, entries: &[SubtitleEntry]) -> Vec<SubtitleEntry> {
        let mut balanced = Vec::with_capacity(entries.len());

        for entry in entries {
            if Self::count_words(&entry.text) <= self.max_words_per_screen {
                balanced.push(entry.clone());
                continue;
            }

            let pieces = Self::split_text(&entry.text, self.max_words_per_screen);
            if pieces.len() <= 1 {
                debug!("Subtitle {} could not be shortened, keeping it whole", entry.seq_num);
                balanced.push(entry.clone());
                continue;
            }

            balanced.extend(self.distribute(entry, pieces));
        }

        for (i, entry) in balanced.iter_mut().enumerate() {
            entry.seq_num = i + 1;
        }

        debug!("Balanced {} subtitles into {}", entries.len(), balanced.len());
        balanced
    }

    fn distribute(&self, entry: &SubtitleEntry, pieces: Vec<String>) -> Vec<SubtitleEntry> {
        let span = entry.duration_ms() as f64;
        let mut weights: Vec<usize> = pieces.iter().map(|p| Self::count_words(p)).collect();
        if weights.iter().all(|&w| w == 0) {
            weights = vec![1; pieces.len()];
        }
        let total_weight: usize = weights.iter().sum();

        let last = pieces.len() - 1;
        let mut start = entry.start_time_ms;
        let mut result = Vec::with_capacity(pieces.len());

        for (i, (text, weight)) in pieces.into_iter().zip(weights).enumerate() {
            let mut end = if i == last {
                entry.end_time_ms
            } else {
                let share = (span * weight as f64 / total_weight as f64).round() as u64;
                start + share.max(self.min_duration_ms)
            };

            if end < start + self.min_duration_ms {
                end = start + self.min_duration_ms;
            }
            if end > entry.end_time_ms {
                debug!(
                    "Piece {} of subtitle {} ends at {}ms, past the original end {}ms",
                    i + 1, entry.seq_num, end, entry.end_time_ms
                );
            }

            result.push(SubtitleEntry::new(entry.seq_num, start, end, text));
            start = end;
        }

        result
    }

    /// Word statistics, listing every subtitle over the budget
    pub fn analyze(&self, entries: &[SubtitleEntry]) -> BalanceReport {
        let counts: Vec<usize> = entries.iter().map(|e| Self::count_words(&e.text)).collect();
        let total_words: usize = counts.iter().sum();

        let over_budget = entries
            .iter()
            .zip(&counts)
            .filter(|(_, count)| **count > self.max_words_per_screen)
            .map(|(entry, count)| OverBudgetEntry {
                seq_num: entry.seq_num,
                word_count: *count,
                preview: Self::preview(&entry.text),
            })
            .collect();

        BalanceReport {
            total_entries: entries.len(),
            average_words: if entries.is_empty() { 0.0 } else { total_words as f64 / entries.len() as f64 },
            max_words: counts.iter().copied().max().unwrap_or(0),
            over_budget,
        }
    }

    fn preview(text: &str) -> String {
        let flat = text.replace(LINE_BREAK, " ");
        if flat.chars().count() > PREVIEW_CHARS {
            let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
            format!("{}...", cut)
        } else {
            flat
        }
    }
}
