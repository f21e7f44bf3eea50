// Title validation and normalization.
//
// Pure functions over a raw snapshot: drop null titles, run the quality
// expectations, strip special characters. The expectations are observations
// for the report; a failed one never stops the stage or removes a row.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::db::models::{CleanedPost, RawSnapshot};
use crate::error::StageError;

/// Anything outside ASCII letters, digits and whitespace.
static SPECIAL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9\s]").expect("valid special-char pattern")
});

pub const MIN_WORDS: usize = 1;
pub const MAX_WORDS: usize = 100;
/// The distinct-title check passes only above this many.
pub const MIN_UNIQUE_TITLES: usize = 5;

/// One named quality check and whether it held for the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub name: &'static str,
    pub passed: bool,
}

/// What the cleaning stage observed and did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityReport {
    pub rows_loaded: usize,
    pub rows_dropped_null_title: usize,
    pub rows_written: usize,
    pub expectations: Vec<Expectation>,
    pub unique_titles: usize,
    /// Titles (before stripping) containing at least one special character.
    pub special_char_titles: usize,
    pub special_char_fraction: f64,
}

impl QualityReport {
    pub fn failed_expectations(&self) -> impl Iterator<Item = &Expectation> {
        self.expectations.iter().filter(|e| !e.passed)
    }
}

pub fn has_special_chars(text: &str) -> bool {
    SPECIAL_CHARS.is_match(text)
}

/// Remove every character outside letters, digits and whitespace.
/// Whitespace is kept as-is, so "a - b" becomes "a  b".
pub fn sanitize(text: &str) -> String {
    SPECIAL_CHARS.replace_all(text, "").into_owned()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Validate and normalize a snapshot.
///
/// Fails with `StageError::Configuration` if the raw schema has no title
/// column. For a fixed snapshot the output is always the same.
pub fn clean(snapshot: &RawSnapshot) -> Result<(Vec<CleanedPost>, QualityReport), StageError> {
    if !snapshot.has_title_column {
        return Err(StageError::Configuration(
            "raw table has no `title` column; nothing to clean".to_string(),
        ));
    }

    let rows_loaded = snapshot.posts.len();

    // Null titles are the only drop rule
    let titled: Vec<(&str, &str)> = snapshot
        .posts
        .iter()
        .filter_map(|p| p.title.as_deref().map(|t| (p.id.as_str(), t)))
        .collect();

    let unique_titles = titled.iter().map(|(_, t)| *t).collect::<HashSet<_>>().len();
    let word_counts_ok = titled
        .iter()
        .all(|(_, t)| (MIN_WORDS..=MAX_WORDS).contains(&word_count(t)));
    let special_char_titles = titled.iter().filter(|(_, t)| has_special_chars(t)).count();
    let special_char_fraction = if titled.is_empty() {
        0.0
    } else {
        special_char_titles as f64 / titled.len() as f64
    };

    let expectations = vec![
        Expectation {
            name: "expect_column_to_exist",
            passed: true,
        },
        Expectation {
            // Titles are coerced to text at the store boundary
            name: "expect_column_values_to_be_string",
            passed: true,
        },
        Expectation {
            name: "expect_column_word_count_to_be_between_1_and_100",
            passed: word_counts_ok,
        },
        Expectation {
            name: "expect_column_values_to_have_more_than_5_uniques",
            passed: unique_titles > MIN_UNIQUE_TITLES,
        },
    ];

    let cleaned: Vec<CleanedPost> = titled
        .iter()
        .map(|(id, title)| CleanedPost {
            id: id.to_string(),
            cleaned_title: sanitize(title),
        })
        .collect();

    let report = QualityReport {
        rows_loaded,
        rows_dropped_null_title: rows_loaded - titled.len(),
        rows_written: cleaned.len(),
        expectations,
        unique_titles,
        special_char_titles,
        special_char_fraction,
    };

    Ok((cleaned, report))
}
