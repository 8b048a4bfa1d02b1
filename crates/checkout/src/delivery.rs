//! Pincode lookup and delivery-date estimation.
//!
//! Which pincodes are served, from which city, and how fast, is data: it is
//! loaded from configuration and only falls back to a small built-in table.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PincodeEntry {
    pub pincode: String,
    pub city: String,
    pub state: String,
    /// Calendar days from order to delivery.
    pub days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryEstimate {
    pub city: Option<String>,
    pub state: Option<String>,
    pub days: u32,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DeliveryTableConfig", into = "DeliveryTableConfig")]
pub struct DeliveryTable {
    default_days: u32,
    entries: HashMap<String, PincodeEntry>,
}

/// On-disk shape of the table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DeliveryTableConfig {
    #[serde(default = "default_days")]
    default_days: u32,
    #[serde(default)]
    entries: Vec<PincodeEntry>,
}

fn default_days() -> u32 {
    7
}

impl From<DeliveryTableConfig> for DeliveryTable {
    fn from(config: DeliveryTableConfig) -> Self {
        DeliveryTable::new(config.default_days, config.entries)
    }
}

impl From<DeliveryTable> for DeliveryTableConfig {
    fn from(table: DeliveryTable) -> Self {
        let mut entries: Vec<PincodeEntry> = table.entries.into_values().collect();
        entries.sort_by(|a, b| a.pincode.cmp(&b.pincode));
        Self {
            default_days: table.default_days,
            entries,
        }
    }
}

impl Default for DeliveryTable {
    fn default() -> Self {
        let entry = |pincode: &str, city: &str, state: &str, days| PincodeEntry {
            pincode: pincode.to_string(),
            city: city.to_string(),
            state: state.to_string(),
            days,
        };
        DeliveryTable::new(
            default_days(),
            vec![
                entry("110001", "New Delhi", "Delhi", 2),
                entry("400001", "Mumbai", "Maharashtra", 2),
                entry("560001", "Bengaluru", "Karnataka", 3),
                entry("600001", "Chennai", "Tamil Nadu", 3),
                entry("700001", "Kolkata", "West Bengal", 4),
            ],
        )
    }
}

impl DeliveryTable {
    /// Later entries for the same pincode replace earlier ones.
    pub fn new(default_days: u32, entries: impl IntoIterator<Item = PincodeEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| (e.pincode.trim().to_string(), e))
            .collect();
        Self {
            default_days,
            entries,
        }
    }

    pub fn default_days(&self) -> u32 {
        self.default_days
    }

    pub fn lookup(&self, pincode: &str) -> Option<&PincodeEntry> {
        self.entries.get(pincode.trim())
    }

    /// Delivery date for an order placed on `placed_on`.
    ///
    /// Unknown pincodes get `default_days`.
    pub fn estimate(&self, pincode: &str, placed_on: NaiveDate) -> DeliveryEstimate {
        let entry = self.lookup(pincode);
        let days = entry.map_or(self.default_days, |e| e.days);
        let date = placed_on
            .checked_add_days(Days::new(u64::from(days)))
            .unwrap_or(NaiveDate::MAX);

        DeliveryEstimate {
            city: entry.map(|e| e.city.clone()),
            state: entry.map(|e| e.state.clone()),
            days,
            date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn known_pincode_uses_its_own_days() {
        let estimate = DeliveryTable::default().estimate("560001", date(2026, 3, 30));
        assert_eq!(estimate.city.as_deref(), Some("Bengaluru"));
        assert_eq!(estimate.days, 3);
        assert_eq!(estimate.date, date(2026, 4, 2));
    }

    #[test]
    fn unknown_pincode_falls_back_to_default_days() {
        let estimate = DeliveryTable::default().estimate("999999", date(2026, 1, 1));
        assert_eq!(estimate.city, None);
        assert_eq!(estimate.days, 7);
        assert_eq!(estimate.date, date(2026, 1, 8));
    }

    #[test]
    fn loads_from_json_config() {
        let json = r#"{
            "default_days": 5,
            "entries": [
                { "pincode": "411001", "city": "Pune", "state": "Maharashtra", "days": 1 }
            ]
        }"#;
        let table: DeliveryTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.default_days(), 5);
        assert_eq!(table.lookup("411001").map(|e| e.city.as_str()), Some("Pune"));
        assert!(table.lookup("110001").is_none());
    }

    #[test]
    fn empty_config_gets_default_days() {
        let table: DeliveryTable = serde_json::from_str("{}").unwrap();
        assert_eq!(table.default_days(), 7);
    }
}
