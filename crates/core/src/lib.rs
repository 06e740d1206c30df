//! Nonito Core - Shared domain library.
//!
//! This crate provides the domain types and rules used by the storefront
//! service and the CLI:
//! - `storefront` - Public shop: catalog, cart, checkout, fulfillment
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. This keeps it lightweight and easy to test.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for slugs, prices, and statuses
//! - [`sanitize`] - Markup stripping and identifier/notes sanitizing
//! - [`catalog`] - Products, fabrics, and line resolution
//! - [`cart`] - The cart state machine and its persisted form

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod sanitize;
pub mod types;

pub use cart::{Cart, CartKey, CartLine, CartTotals};
pub use catalog::{Catalog, CatalogFabrics, Fabric, Product, ResolvedLine};
pub use sanitize::Notes;
pub use types::*;
