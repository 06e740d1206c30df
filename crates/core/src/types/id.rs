//! Newtype identifiers for type-safe catalog references.
//!
//! Products and fabrics are identified by human-readable slugs. Use the
//! `define_slug!` macro to create wrappers that validate the identifier
//! allow-list on construction and prevent mixing product and fabric slugs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length (in characters) of a catalog identifier.
pub const MAX_SLUG_LENGTH: usize = 50;

/// Maximum length of a payment session token.
pub const MAX_SESSION_ID_LENGTH: usize = 255;

/// Errors produced when parsing an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlugError {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier is longer than {max} characters")]
    TooLong { max: usize },
    #[error("identifier contains a disallowed character: {0:?}")]
    InvalidChar(char),
}

/// Whether `c` may appear in a catalog identifier.
#[must_use]
pub const fn is_slug_char(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | 'å' | 'ä' | 'ö' | 'Å' | 'Ä' | 'Ö')
}

/// Validate a catalog identifier against the allow-list and length ceiling.
///
/// # Errors
///
/// Returns `SlugError` if the value is empty, too long, or contains a
/// character outside the allow-list.
pub fn validate_slug(value: &str) -> Result<(), SlugError> {
    if value.is_empty() {
        return Err(SlugError::Empty);
    }
    if value.chars().count() > MAX_SLUG_LENGTH {
        return Err(SlugError::TooLong {
            max: MAX_SLUG_LENGTH,
        });
    }
    if let Some(c) = value.chars().find(|c| !is_slug_char(*c)) {
        return Err(SlugError::InvalidChar(c));
    }
    Ok(())
}

/// Macro to define a validated slug wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` as a plain string (validated on deserialize)
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()`, `as_str()` and `Display`
/// - `sqlx` `Type`, `Encode`, and `Decode` implementations (with `postgres` feature)
///
/// # Example
///
/// ```rust
/// # use nonito_core::define_slug;
/// define_slug!(ColorSlug);
///
/// let slug = ColorSlug::parse("linne-beige").unwrap();
/// assert_eq!(slug.as_str(), "linne-beige");
/// assert!(ColorSlug::parse("<b>").is_err());
/// ```
#[macro_export]
macro_rules! define_slug {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse and validate a slug.
            ///
            /// # Errors
            ///
            /// Returns `SlugError` if the value violates the identifier allow-list.
            pub fn parse(value: &str) -> ::core::result::Result<Self, $crate::types::id::SlugError> {
                $crate::types::id::validate_slug(value)?;
                Ok(Self(value.to_owned()))
            }

            /// Get the slug as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::convert::TryFrom<String> for $name {
            type Error = $crate::types::id::SlugError;

            fn try_from(value: String) -> ::core::result::Result<Self, Self::Error> {
                $crate::types::id::validate_slug(&value)?;
                Ok(Self(value))
            }
        }

        impl From<$name> for String {
            fn from(slug: $name) -> Self {
                slug.0
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::SlugError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Type<::sqlx::Postgres> for $name {
            fn type_info() -> ::sqlx::postgres::PgTypeInfo {
                <String as ::sqlx::Type<::sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &::sqlx::postgres::PgTypeInfo) -> bool {
                <String as ::sqlx::Type<::sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> ::sqlx::Decode<'r, ::sqlx::Postgres> for $name {
            fn decode(
                value: ::sqlx::postgres::PgValueRef<'r>,
            ) -> ::core::result::Result<Self, ::sqlx::error::BoxDynError> {
                let raw = <String as ::sqlx::Decode<::sqlx::Postgres>>::decode(value)?;
                Ok(Self::try_from(raw)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl ::sqlx::Encode<'_, ::sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut ::sqlx::postgres::PgArgumentBuffer,
            ) -> ::std::result::Result<::sqlx::encode::IsNull, ::sqlx::error::BoxDynError> {
                <String as ::sqlx::Encode<::sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

define_slug!(ProductSlug);
define_slug!(FabricSlug);

/// Token issued by the payment provider for a checkout session.
///
/// Doubles as the idempotency key of the processed-order ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckoutSessionId(String);

impl CheckoutSessionId {
    /// Parse a session token.
    ///
    /// Provider tokens are ASCII alphanumerics and underscores.
    ///
    /// # Errors
    ///
    /// Returns `SlugError` if the token is empty, too long, or malformed.
    pub fn parse(value: &str) -> Result<Self, SlugError> {
        if value.is_empty() {
            return Err(SlugError::Empty);
        }
        if value.len() > MAX_SESSION_ID_LENGTH {
            return Err(SlugError::TooLong {
                max: MAX_SESSION_ID_LENGTH,
            });
        }
        if let Some(c) = value
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(SlugError::InvalidChar(c));
        }
        Ok(Self(value.to_owned()))
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CheckoutSessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CheckoutSessionId {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CheckoutSessionId> for String {
    fn from(id: CheckoutSessionId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_accepts_swedish_letters() {
        let slug = ProductSlug::parse("miniskötväska").unwrap();
        assert_eq!(slug.as_str(), "miniskötväska");
    }

    #[test]
    fn test_slug_rejects_markup_and_spaces() {
        assert_eq!(
            FabricSlug::parse("linne beige"),
            Err(SlugError::InvalidChar(' '))
        );
        assert!(FabricSlug::parse("<script>").is_err());
        assert_eq!(FabricSlug::parse(""), Err(SlugError::Empty));
    }

    #[test]
    fn test_slug_length_counts_characters() {
        assert!(ProductSlug::parse(&"ö".repeat(MAX_SLUG_LENGTH)).is_ok());
        assert_eq!(
            ProductSlug::parse(&"a".repeat(MAX_SLUG_LENGTH + 1)),
            Err(SlugError::TooLong {
                max: MAX_SLUG_LENGTH
            })
        );
    }

    #[test]
    fn test_slug_deserialize_validates() {
        let ok: ProductSlug = serde_json::from_str("\"mini-pouch\"").unwrap();
        assert_eq!(ok.to_string(), "mini-pouch");
        assert!(serde_json::from_str::<ProductSlug>("\"mini pouch\"").is_err());
    }

    #[test]
    fn test_session_id_parse() {
        assert!(CheckoutSessionId::parse("cs_test_a1B2c3").is_ok());
        assert!(CheckoutSessionId::parse("cs_test/../x").is_err());
        assert!(CheckoutSessionId::parse("").is_err());
    }
}
