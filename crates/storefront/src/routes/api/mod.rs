//! JSON API consumed by the storefront client.

pub mod checkout;
pub mod products;
pub mod session;
pub mod webhook;
