//! Payment selection and method-specific detail validation.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstore_core::{PaymentMethod, ValueObject};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    #[error("UPI id must look like name@bank")]
    InvalidVpa,

    #[error("card number is not valid")]
    InvalidCardNumber,

    #[error("card expiry must be MM/YY")]
    InvalidExpiry,

    #[error("card has expired")]
    CardExpired,

    #[error("{0} is required")]
    MissingField(&'static str),
}

/// Payment form as submitted by the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentInput {
    Upi { vpa: String },
    Card { number: String, expiry: String, holder: String },
    NetBanking { bank: String },
    Wallet { provider: String },
    Cod,
}

/// Validated, storable payment details. Card numbers are reduced to their last four digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum PaymentDetails {
    Upi { vpa: String },
    Card { last4: String, expiry: String, holder: String },
    NetBanking { bank: String },
    Wallet { provider: String },
    Cod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentSelection {
    method: PaymentMethod,
    details: PaymentDetails,
}

impl PaymentSelection {
    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn details(&self) -> &PaymentDetails {
        &self.details
    }

    pub fn cash_on_delivery() -> Self {
        Self {
            method: PaymentMethod::Cod,
            details: PaymentDetails::Cod,
        }
    }
}

impl ValueObject for PaymentSelection {}

impl PaymentInput {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentInput::Upi { .. } => PaymentMethod::Upi,
            PaymentInput::Card { .. } => PaymentMethod::Card,
            PaymentInput::NetBanking { .. } => PaymentMethod::NetBanking,
            PaymentInput::Wallet { .. } => PaymentMethod::Wallet,
            PaymentInput::Cod => PaymentMethod::Cod,
        }
    }

    pub fn validate(&self) -> Result<PaymentSelection, PaymentError> {
        self.validate_on(Utc::now().date_naive())
    }

    /// Validate against a fixed "today" (card expiry depends on it).
    pub fn validate_on(&self, today: NaiveDate) -> Result<PaymentSelection, PaymentError> {
        let details = match self {
            PaymentInput::Upi { vpa } => {
                let vpa = vpa.trim();
                let valid = vpa.split_once('@').is_some_and(|(name, bank)| {
                    !name.is_empty() && !bank.is_empty() && !bank.contains('@')
                }) && !vpa.contains(char::is_whitespace);
                if !valid {
                    return Err(PaymentError::InvalidVpa);
                }
                PaymentDetails::Upi {
                    vpa: vpa.to_ascii_lowercase(),
                }
            }
            PaymentInput::Card {
                number,
                expiry,
                holder,
            } => {
                let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
                if digits.len() != 16 || !luhn_valid(&digits) {
                    return Err(PaymentError::InvalidCardNumber);
                }
                let (month, year) = parse_expiry(expiry)?;
                if (year, month) < (today.year(), today.month()) {
                    return Err(PaymentError::CardExpired);
                }
                let holder = non_empty("holder", holder)?;
                PaymentDetails::Card {
                    last4: digits[12..].to_string(),
                    expiry: format!("{month:02}/{:02}", year % 100),
                    holder,
                }
            }
            PaymentInput::NetBanking { bank } => PaymentDetails::NetBanking {
                bank: non_empty("bank", bank)?,
            },
            PaymentInput::Wallet { provider } => PaymentDetails::Wallet {
                provider: non_empty("provider", provider)?,
            },
            PaymentInput::Cod => PaymentDetails::Cod,
        };

        Ok(PaymentSelection {
            method: self.method(),
            details,
        })
    }
}

fn non_empty(field: &'static str, value: &str) -> Result<String, PaymentError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PaymentError::MissingField(field));
    }
    Ok(value.to_string())
}

/// `MM/YY` → (month, full year).
fn parse_expiry(expiry: &str) -> Result<(u32, i32), PaymentError> {
    let (mm, yy) = expiry
        .trim()
        .split_once('/')
        .ok_or(PaymentError::InvalidExpiry)?;
    if mm.len() != 2 || yy.len() != 2 {
        return Err(PaymentError::InvalidExpiry);
    }
    let month: u32 = mm.parse().map_err(|_| PaymentError::InvalidExpiry)?;
    let year: i32 = yy.parse().map_err(|_| PaymentError::InvalidExpiry)?;
    if !(1..=12).contains(&month) {
        return Err(PaymentError::InvalidExpiry);
    }
    Ok((month, 2000 + year))
}

fn luhn_valid(digits: &str) -> bool {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}
