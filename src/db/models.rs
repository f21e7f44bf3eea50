// Data models: Rust structs that map to database rows.
//
// These are the types that flow through the pipeline. They're separate
// from the database queries so connectors, the cleaner and the labeler
// can use them without depending on rusqlite directly.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format used in the `raw.timestamp` column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which external surface a post was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    Reddit,
    Quora,
    Twitter,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
            Platform::Quora => "quora",
            Platform::Twitter => "twitter",
        }
    }

    /// Parse a platform tag as stored in the database or given on the CLI.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reddit" => Some(Platform::Reddit),
            "quora" => Some(Platform::Quora),
            "twitter" | "x" => Some(Platform::Twitter),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A captured post, exactly as a connector produced it.
///
/// `title` is optional because the raw table accepts null titles; every
/// connector fills it in, but the cleaner must cope with rows that don't.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub title: Option<String>,
    pub body: Option<String>,
    pub url: String,
    pub score: i64,
    pub comment_count: i64,
    pub community: String,
    pub captured_at: DateTime<Utc>,
    pub platform: Platform,
}

/// Format a capture timestamp for storage.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored capture timestamp. Unparseable values fall back to the
/// Unix epoch rather than failing the whole snapshot.
pub fn parse_timestamp(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc)))
        .unwrap_or_default()
}

/// A full read of the raw table, handed to the cleaning stage.
#[derive(Debug, Clone, Default)]
pub struct RawSnapshot {
    /// Whether the raw table's schema has a `title` column at all.
    /// When false, every post's title is `None`.
    pub has_title_column: bool,
    pub posts: Vec<RawPost>,
}

/// A validated, normalized post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanedPost {
    pub id: String,
    pub cleaned_title: String,
}

/// Binary cyberbullying judgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// 0: neutral or harmless content
    Neutral,
    /// 1: harassment, threats, slurs, abusive or degrading language
    Cyberhate,
}

impl Label {
    pub fn as_i64(&self) -> i64 {
        match self {
            Label::Neutral => 0,
            Label::Cyberhate => 1,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(Label::Neutral),
            1 => Some(Label::Cyberhate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Neutral => "neutral",
            Label::Cyberhate => "cyberhate",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_i64(), self.as_str())
    }
}

/// A classification result stored in the label table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledPost {
    pub id: String,
    pub title: String,
    pub label: Label,
}

/// One row of the presentation view consumed by the analytics layer:
/// the label table joined with the raw table, columns renamed for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelledView {
    pub topic: Option<String>,
    pub community: String,
    pub score: i64,
    pub comments: i64,
    pub timestamp: String,
    pub platform: String,
    pub label: Option<Label>,
}

/// Row counts across the pipeline's tables, for `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub raw: i64,
    pub raw_null_title: i64,
    pub cleaned: i64,
    pub labelled: i64,
    pub cyberhate: i64,
}
