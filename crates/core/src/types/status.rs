//! Status enums for catalog and payment entities.

use serde::{Deserialize, Serialize};

/// Which side of a product a fabric is sewn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FabricRole {
    /// Visible outer material.
    Outer,
    /// Lining.
    Inner,
}

impl FabricRole {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outer => "outer",
            Self::Inner => "inner",
        }
    }
}

impl std::fmt::Display for FabricRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FabricRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outer" => Ok(Self::Outer),
            "inner" => Ok(Self::Inner),
            _ => Err(format!("invalid fabric role: {s}")),
        }
    }
}

/// Payment status of a checkout session, as reported by the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Whether the order may be fulfilled.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fabric_role_round_trip_str() {
        assert_eq!("outer".parse::<FabricRole>().unwrap(), FabricRole::Outer);
        assert_eq!(FabricRole::Inner.to_string(), "inner");
        assert!("lining".parse::<FabricRole>().is_err());
    }

    #[test]
    fn test_payment_status_serde() {
        let status: PaymentStatus = serde_json::from_str("\"no_payment_required\"").unwrap();
        assert_eq!(status, PaymentStatus::NoPaymentRequired);
        assert!(!status.is_paid());
        assert!(PaymentStatus::Paid.is_paid());
    }
}
