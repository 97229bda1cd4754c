//! Snippet data model: batch descriptors, drafts and the on-disk record.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Top-level key Alfred expects in every snippet file.
pub const WRAPPER_KEY: &str = "alfredsnippet";

const FALLBACK_COLLECTION: &str = "Snippets";

static MINOR_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "an", "and", "as", "at", "but", "by", "for", "from", "in", "into", "nor", "of",
        "on", "or", "per", "the", "to", "via", "vs", "with",
    ]
    .into_iter()
    .collect()
});

/// How sure the suggestion service is about its categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Accepted without review
    High,
    /// Offered to the user for confirmation
    Medium,
    /// Sent to manual input
    Low,
}

impl Confidence {
    /// Parses `high`, `medium` or `low` (case-insensitive).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Returns the lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a batch input file.
///
/// Only `content` is required. The `suggested_*` fields skip the AI call when
/// all three are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetDescriptor {
    /// Expansion text
    #[serde(alias = "snippet")]
    pub content: String,

    /// Collection folder name
    #[serde(default, alias = "collection")]
    pub suggested_collection: Option<String>,

    /// Display name
    #[serde(default, alias = "name")]
    pub suggested_name: Option<String>,

    /// Trigger keyword
    #[serde(default, alias = "keyword")]
    pub suggested_keyword: Option<String>,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Confidence carried over from a previous suggestion
    #[serde(default)]
    pub confidence: Option<Confidence>,
}

impl SnippetDescriptor {
    /// Deserializes and validates a single batch entry.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the entry is not an object, has a
    /// wrongly typed field, or has empty content.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let mut descriptor: Self = serde_json::from_value(value.clone())
            .map_err(|e| Error::validation("entry", e.to_string()))?;

        if descriptor.content.trim().is_empty() {
            return Err(Error::validation("content", "must not be empty"));
        }

        descriptor.suggested_collection = non_blank(descriptor.suggested_collection);
        descriptor.suggested_name = non_blank(descriptor.suggested_name);
        descriptor.suggested_keyword = non_blank(descriptor.suggested_keyword);
        descriptor.description = non_blank(descriptor.description);

        Ok(descriptor)
    }

    /// Returns true when collection, name and keyword are all supplied.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.suggested_collection.is_some()
            && self.suggested_name.is_some()
            && self.suggested_keyword.is_some()
    }

    /// Returns a short, single-line preview of the content.
    #[must_use]
    pub fn preview(&self) -> String {
        preview(&self.content, 50)
    }
}

/// Fully resolved metadata for a snippet that is about to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetDraft {
    /// Expansion text
    pub content: String,
    /// Sanitized collection folder name
    pub collection: String,
    /// Display name
    pub name: String,
    /// Trigger keyword
    pub keyword: String,
    /// Free-text description (not written to the file)
    pub description: String,
}

impl SnippetDraft {
    /// Creates a draft, sanitizing the collection and checking required fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error if content, name or keyword is empty, or if
    /// the keyword contains characters outside `[A-Za-z0-9_-]`.
    pub fn new(
        content: impl Into<String>,
        collection: &str,
        name: impl Into<String>,
        keyword: impl Into<String>,
        description: impl Into<String>,
    ) -> Result<Self> {
        let content = content.into();
        let name = name.into().trim().to_string();
        let keyword = keyword.into().trim().to_string();

        if content.trim().is_empty() {
            return Err(Error::validation("content", "must not be empty"));
        }
        if name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        validate_keyword(&keyword)?;

        Ok(Self {
            content,
            collection: sanitize_collection_name(collection),
            name,
            keyword,
            description: description.into().trim().to_string(),
        })
    }
}

/// The JSON object Alfred reads, nested under [`WRAPPER_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetRecord {
    /// Expansion text
    pub snippet: String,
    /// Display name
    pub name: String,
    /// Trigger keyword
    pub keyword: String,
    /// Unique identifier, also part of the filename
    pub uid: String,
}

/// On-disk snippet file: `{"alfredsnippet": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetFile {
    /// Wrapped record
    #[serde(rename = "alfredsnippet")]
    pub record: SnippetRecord,
}

impl SnippetFile {
    /// Wraps a draft with the given UID.
    #[must_use]
    pub fn from_draft(draft: &SnippetDraft, uid: impl Into<String>) -> Self {
        Self {
            record: SnippetRecord {
                snippet: draft.content.clone(),
                name: draft.name.clone(),
                keyword: draft.keyword.clone(),
                uid: uid.into(),
            },
        }
    }

    /// Renders the file body as 2-space indented JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Checks a user-supplied keyword: non-empty, only `[A-Za-z0-9_-]`.
///
/// # Errors
///
/// Returns a validation error describing the problem.
pub fn validate_keyword(keyword: &str) -> Result<()> {
    if keyword.is_empty() {
        return Err(Error::validation("keyword", "must not be empty"));
    }
    if !keyword
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::validation(
            "keyword",
            format!("'{keyword}' may only contain letters, digits, '_' and '-'"),
        ));
    }
    Ok(())
}

/// Returns true if the keyword follows the `topic_function` convention:
/// lowercase alphanumeric groups joined by single `_` or `-`.
#[must_use]
pub fn is_conventional_keyword(keyword: &str) -> bool {
    !keyword.is_empty()
        && keyword
            .split(['_', '-'])
            .all(|part| {
                !part.is_empty()
                    && part
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
            })
}

/// Returns true if every word is capitalized, allowing minor words after the
/// first and mixed-case brand names such as `macOS`.
#[must_use]
pub fn is_title_case(text: &str) -> bool {
    let mut words = text.split_whitespace().peekable();
    if words.peek().is_none() {
        return false;
    }

    words.enumerate().all(|(index, word)| {
        let Some(first) = word.chars().find(|c| c.is_alphanumeric()) else {
            return true;
        };
        if !first.is_lowercase() {
            return true;
        }
        let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
        (index > 0 && MINOR_WORDS.contains(bare)) || word.chars().any(char::is_uppercase)
    })
}

/// Strips characters that are invalid in folder names.
#[must_use]
pub fn sanitize_collection_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*'))
        .collect();
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == ' ');

    if trimmed.is_empty() {
        FALLBACK_COLLECTION.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Lowercases a keyword and replaces anything outside `[a-z0-9_-]` with `_`.
#[must_use]
pub fn filename_keyword(keyword: &str) -> String {
    keyword
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > max_chars {
        let cut: String = single_line.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        single_line
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
