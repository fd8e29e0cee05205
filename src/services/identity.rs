//! Participant identity — ids, rejoin codes, and display names.
//!
//! DESIGN
//! ======
//! Participant ids are random v4 UUIDs. Rejoin codes are 3-digit strings
//! (100..=999) that a person can read off one screen and type on another.
//! Allocation samples randomly a few times, then falls back to a linear
//! scan so a free code is always found while one exists.

use std::collections::HashSet;

use rand::Rng;
use uuid::Uuid;

use crate::services::session::Session;

pub const CODE_MIN: u16 = 100;
pub const CODE_MAX: u16 = 999;
const CODE_SAMPLE_ATTEMPTS: usize = 10;

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("name is required")]
    NameEmpty,
    #[error("name must be between {min} and {max} characters", min = NAME_MIN_CHARS, max = NAME_MAX_CHARS)]
    NameLength,
    #[error("name may only contain letters, digits, spaces, and - _ ' .")]
    NameCharset,
    #[error("all participant codes are in use")]
    CodeSpaceExhausted,
}

/// Fresh opaque participant id.
#[must_use]
pub fn allocate_participant_id() -> Uuid {
    Uuid::new_v4()
}

/// Pick a 3-digit code not present in `existing`.
///
/// # Errors
///
/// Returns `CodeSpaceExhausted` when all 900 codes are taken.
pub fn allocate_user_code(existing: &HashSet<String>) -> Result<String, IdentityError> {
    let mut rng = rand::rng();
    for _ in 0..CODE_SAMPLE_ATTEMPTS {
        let code = rng.random_range(CODE_MIN..=CODE_MAX).to_string();
        if !existing.contains(&code) {
            return Ok(code);
        }
    }

    (CODE_MIN..=CODE_MAX)
        .map(|n| n.to_string())
        .find(|code| !existing.contains(code))
        .ok_or(IdentityError::CodeSpaceExhausted)
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Case-insensitive, trimmed name collision check. `exclude` skips one
/// participant, so someone renaming to their own name is not a conflict.
#[must_use]
pub fn is_name_taken(session: &Session, name: &str, exclude: Option<Uuid>) -> bool {
    let wanted = name_key(name);
    session
        .participants
        .values()
        .filter(|p| Some(p.id) != exclude)
        .any(|p| name_key(&p.name) == wanted)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '\'' | '.')
}

/// Validate a display name and return its trimmed form.
///
/// # Errors
///
/// Returns the first rule the name breaks.
pub fn validate_name(name: &str) -> Result<String, IdentityError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(IdentityError::NameEmpty);
    }
    let len = trimmed.chars().count();
    if !(NAME_MIN_CHARS..=NAME_MAX_CHARS).contains(&len) {
        return Err(IdentityError::NameLength);
    }
    if !trimmed.chars().all(is_name_char) {
        return Err(IdentityError::NameCharset);
    }
    Ok(trimmed.to_owned())
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
