//! Catalog prices.
//!
//! Catalog prices are whole currency units (kronor). The payment provider
//! works in minor units (öre), so conversion happens only at that boundary.

use serde::{Deserialize, Serialize};

/// Minor units per whole currency unit.
const MINOR_UNITS_PER_UNIT: i64 = 100;

/// A price in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// The zero price.
    pub const ZERO: Self = Self(0);

    /// Create a price from whole currency units.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Amount in whole currency units.
    #[must_use]
    pub const fn amount(self) -> i64 {
        self.0
    }

    /// Amount in minor units, as sent to the payment provider.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0.saturating_mul(MINOR_UNITS_PER_UNIT)
    }

    /// Multiply by a line quantity.
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0.saturating_mul(quantity as i64))
    }
}

impl std::ops::Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, p| acc + p)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.0, CurrencyCode::SEK.code())
    }
}

/// ISO 4217 currency codes the shop sells in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    SEK,
}

impl CurrencyCode {
    /// Upper-case ISO code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SEK => "SEK",
        }
    }

    /// Lower-case code as the payment provider expects it.
    #[must_use]
    pub const fn provider_code(self) -> &'static str {
        match self {
            Self::SEK => "sek",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units() {
        assert_eq!(Price::new(49).minor_units(), 4900);
        assert_eq!(Price::new(350).times(3).amount(), 1050);
    }

    #[test]
    fn test_sum_and_display() {
        let total: Price = [Price::new(150), Price::new(350)].into_iter().sum();
        assert_eq!(total, Price::new(500));
        assert_eq!(total.to_string(), "500 SEK");
    }
}
