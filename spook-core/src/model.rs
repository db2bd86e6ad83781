use std::{fmt, path::PathBuf};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Layout of `createdAt` / `updatedAt`, e.g. `2024-03-01 18:30:00 +0700`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S %z";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    Parse(chrono::ParseError),
    /// Parsed, but not written exactly as `TIMESTAMP_FORMAT` prints it
    /// (one-digit fields, `+07:00` offsets, surrounding spaces).
    NotCanonical,
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Parse(e) => write!(f, "{}", e),
            TimestampError::NotCanonical => write!(f, "expected YYYY-MM-DD hh:mm:ss +hhmm"),
        }
    }
}

impl std::error::Error for TimestampError {}

impl From<chrono::ParseError> for TimestampError {
    fn from(err: chrono::ParseError) -> Self {
        TimestampError::Parse(err)
    }
}

/// Parses a content timestamp. Only the exact `TIMESTAMP_FORMAT` layout is
/// accepted.
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, TimestampError> {
    let ts = DateTime::parse_from_str(value, TIMESTAMP_FORMAT)?;
    if ts.format(TIMESTAMP_FORMAT).to_string() != value {
        return Err(TimestampError::NotCanonical);
    }

    Ok(ts)
}

/// Metadata block of a post's `_index.md`.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default, rename_all = "camelCase")]
pub struct PostMeta {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Excerpt")]
    pub excerpt: String,
    #[serde(alias = "CreatedAt")]
    pub created_at: String,
    #[serde(alias = "UpdatedAt")]
    pub updated_at: String,
    #[serde(alias = "Category")]
    pub category: String,
    #[serde(alias = "Tags")]
    pub tags: Vec<String>,
    #[serde(alias = "Author")]
    pub author: String,
}

/// Metadata block of a page's `_index.md`.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
#[serde(default)]
pub struct PageMeta {
    #[serde(alias = "Title")]
    pub title: String,
    #[serde(alias = "Excerpt")]
    pub excerpt: String,
}

/// Dated content, listed in chronological order and grouped by category and
/// tag.
#[derive(Serialize, Debug, Clone)]
pub struct Post {
    pub title: String,
    pub excerpt: String,
    pub created_at: String,
    pub updated_at: String,
    pub category: String,
    pub tags: Vec<String>,
    pub author: String,
    /// Directory name under `post/`.
    pub slug: String,
    /// URL path, `/post/<slug>`.
    pub path: String,
    pub thumbnail: Option<String>,
    /// Rendered markdown body.
    pub html: String,
    #[serde(skip)]
    pub updated: DateTime<FixedOffset>,
    #[serde(skip)]
    pub source_dir: PathBuf,
}

/// Standalone content, e.g. an "about" page.
#[derive(Serialize, Debug, Clone)]
pub struct Page {
    pub title: String,
    pub excerpt: String,
    pub slug: String,
    /// URL path, `/page/<slug>`.
    pub path: String,
    pub thumbnail: Option<String>,
    pub html: String,
    #[serde(skip)]
    pub source_dir: PathBuf,
}

/// A category or tag together with its link and the number of posts in it.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub path: String,
    pub count: usize,
}
