//! Tag text — canonical form, validation, and categories.
//!
//! DESIGN
//! ======
//! Proposals are terse hyphen-joined words (`coffee-shop`, `saturday-11am`),
//! never sentences. Validation rejects anything outside that shape and hands
//! back a suggested correction.
//! Normalization is a separate, total, idempotent function whose output is
//! both the stored tag text and the dedup key, so "is this a duplicate" is
//! plain string equality.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum hyphen-joined segments in a tag.
pub const MAX_SEGMENTS: usize = 3;

// =============================================================================
// CATEGORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Time,
    Location,
    Food,
    Activity,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Time, Category::Location, Category::Food, Category::Activity];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Location => "location",
            Self::Food => "food",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "location" => Ok(Self::Location),
            "food" => Ok(Self::Food),
            "activity" => Ok(Self::Activity),
            _ => Err(TagError::UnknownCategory(s.to_owned())),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("tag text is empty")]
    Empty,
    #[error("tag text must not contain spaces; join words with hyphens")]
    ContainsWhitespace { suggestion: Option<String> },
    #[error("tag text may contain at most {max} hyphen-joined words", max = MAX_SEGMENTS)]
    TooManySegments { suggestion: Option<String> },
    #[error("tag text may only contain letters, digits and hyphens")]
    InvalidCharacters { suggestion: Option<String> },
    #[error("tag text must not start or end with a hyphen or contain doubled hyphens")]
    MalformedHyphens { suggestion: Option<String> },
    #[error("unknown category: {0}")]
    UnknownCategory(String),
}

impl TagError {
    /// Corrected form the client can offer back to the user, if one exists.
    #[must_use]
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::ContainsWhitespace { suggestion }
            | Self::TooManySegments { suggestion }
            | Self::InvalidCharacters { suggestion }
            | Self::MalformedHyphens { suggestion } => suggestion.as_deref(),
            Self::Empty | Self::UnknownCategory(_) => None,
        }
    }

    /// Request field the error refers to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "category",
            _ => "text",
        }
    }
}

// =============================================================================
// NORMALIZE
// =============================================================================

/// Canonical form of arbitrary input. Total and idempotent.
///
/// Lowercases, turns whitespace into hyphens, drops everything outside
/// `[a-z0-9-]`, collapses hyphen runs, trims edge hyphens, and keeps the first
/// [`MAX_SEGMENTS`] segments. May return an empty string.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let mut flat = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_whitespace() {
            flat.push('-');
            continue;
        }
        for lc in c.to_lowercase() {
            if lc.is_ascii_lowercase() || lc.is_ascii_digit() || lc == '-' {
                flat.push(lc);
            }
        }
    }

    flat.split('-')
        .filter(|segment| !segment.is_empty())
        .take(MAX_SEGMENTS)
        .collect::<Vec<_>>()
        .join("-")
}

fn suggest(raw: &str) -> Option<String> {
    let normalized = normalize(raw);
    (!normalized.is_empty()).then_some(normalized)
}

// =============================================================================
// VALIDATE
// =============================================================================

/// Check raw input against the tag format. Rules apply in a fixed order so
/// the reported error is the first one a user would need to fix.
///
/// # Errors
///
/// Returns the first violated rule, with a normalized suggestion where one
/// can be produced.
pub fn validate(raw: &str) -> Result<(), TagError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(TagError::Empty);
    }

    if text.chars().any(char::is_whitespace) {
        return Err(TagError::ContainsWhitespace { suggestion: suggest(text) });
    }

    if text.matches('-').count() > MAX_SEGMENTS - 1 {
        return Err(TagError::TooManySegments { suggestion: suggest(text) });
    }

    if !text.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(TagError::InvalidCharacters { suggestion: suggest(text) });
    }

    if text.starts_with('-') || text.ends_with('-') || text.contains("--") {
        return Err(TagError::MalformedHyphens { suggestion: suggest(text) });
    }

    Ok(())
}

/// Validate then normalize. The returned string is the tag's dedup key.
///
/// # Errors
///
/// Propagates the validation failure from [`validate`].
pub fn canonicalize(raw: &str) -> Result<String, TagError> {
    validate(raw)?;
    Ok(normalize(raw))
}

#[cfg(test)]
#[path = "tag_test.rs"]
mod tests;
