//! Input sanitizing for shopper-supplied text.
//!
//! Everything that arrives from a browser (persisted carts, checkout bodies)
//! passes through here before it becomes a typed value.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::id::SlugError;

/// Maximum length (in characters) of free-text order notes.
pub const MAX_NOTES_LENGTH: usize = 500;

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"<[^>]*>").expect("markup pattern is a valid regex")
});

/// Remove anything that looks like an HTML tag and trim surrounding whitespace.
#[must_use]
pub fn strip_markup(input: &str) -> String {
    MARKUP.replace_all(input, "").trim().to_owned()
}

/// Sanitize an identifier and parse it into a typed slug.
///
/// Markup is stripped first; the remainder must satisfy the identifier
/// allow-list and length ceiling.
///
/// # Errors
///
/// Returns `SlugError` if nothing valid remains after stripping.
pub fn sanitize_identifier<T>(input: &str) -> Result<T, SlugError>
where
    T: TryFrom<String, Error = SlugError>,
{
    T::try_from(strip_markup(input))
}

/// Notes are too long after sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notes are longer than {MAX_NOTES_LENGTH} characters")]
pub struct NotesTooLong;

/// Sanitized free-text notes attached to a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Notes(String);

impl Notes {
    /// Sanitize raw notes. Empty input (after stripping) yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `NotesTooLong` if the sanitized text exceeds the ceiling.
    pub fn sanitize(input: &str) -> Result<Option<Self>, NotesTooLong> {
        let cleaned = strip_markup(input);
        if cleaned.chars().count() > MAX_NOTES_LENGTH {
            return Err(NotesTooLong);
        }
        if cleaned.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self(cleaned)))
    }

    /// Get the notes as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Notes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ProductSlug;

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("  <b>hej</b> där "), "hej där");
        assert_eq!(strip_markup("<script>alert(1)</script>"), "alert(1)");
    }

    #[test]
    fn test_sanitize_identifier_strips_then_validates() {
        let slug: ProductSlug = sanitize_identifier("<i>mini-pouch</i>").unwrap();
        assert_eq!(slug.as_str(), "mini-pouch");

        let err = sanitize_identifier::<ProductSlug>("<script>alert(1)</script>").unwrap_err();
        assert_eq!(err, SlugError::InvalidChar('('));

        assert_eq!(
            sanitize_identifier::<ProductSlug>("<br>"),
            Err(SlugError::Empty)
        );
    }

    #[test]
    fn test_notes() {
        assert_eq!(Notes::sanitize("   ").unwrap(), None);
        assert_eq!(
            Notes::sanitize("Brodera <b>Alva</b>").unwrap().unwrap().as_str(),
            "Brodera Alva"
        );
        assert!(Notes::sanitize(&"x".repeat(MAX_NOTES_LENGTH)).is_ok());
        assert_eq!(
            Notes::sanitize(&"x".repeat(MAX_NOTES_LENGTH + 1)),
            Err(NotesTooLong)
        );
    }
}
