//! Payment methods offered at checkout.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Upi,
    Card,
    NetBanking,
    Wallet,
    /// Cash on delivery.
    Cod,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 5] = [
        PaymentMethod::Upi,
        PaymentMethod::Card,
        PaymentMethod::NetBanking,
        PaymentMethod::Wallet,
        PaymentMethod::Cod,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Upi => "upi",
            PaymentMethod::Card => "card",
            PaymentMethod::NetBanking => "netbanking",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Cod => "cod",
        }
    }

    pub fn is_cash_on_delivery(self) -> bool {
        self == PaymentMethod::Cod
    }
}

impl core::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == lowered)
            .ok_or_else(|| DomainError::validation(format!("unknown payment method: {s}")))
    }
}
