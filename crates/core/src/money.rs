//! Money in minor currency units.
//!
//! All prices in the store are integers in the smallest currency unit
//! (paise), so `4_000` is ₹40.00. Arithmetic never touches floating point.

/// Amount in minor currency units.
pub type Money = u64;

/// Render an amount for messages and receipts, e.g. `44750` as `₹447.50`.
pub fn format_money(amount: Money) -> String {
    format!("₹{}.{:02}", amount / 100, amount % 100)
}
