//! Session-related types.
//!
//! The cart lives in the session as its persisted JSON form and is re-parsed
//! and validated on every read (see `Cart::from_persisted`).

/// Session keys.
pub mod keys {
    /// Key for the persisted cart (a JSON array of lines).
    pub const CART: &str = "cart";

    /// Key for payment session ids whose confirmation already cleared the
    /// cart, so a repeated confirmation does not clear it again.
    pub const CONFIRMED_ORDERS: &str = "confirmed_orders";
}
