//! Core types for the storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod status;

pub use id::{CheckoutSessionId, FabricSlug, ProductSlug, SlugError};
pub use price::{CurrencyCode, Price};
pub use status::*;
