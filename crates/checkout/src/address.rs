//! Delivery addresses: raw form input, validation, and the saved-address list.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use bookstore_core::{DomainError, DomainResult, ValueObject};

use crate::delivery::DeliveryTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    #[default]
    Home,
    Work,
    Other,
}

/// One failing form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field that failed validation, for inline display next to the form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid address: {}", summarize(.errors))]
pub struct AddressErrors {
    errors: Vec<FieldError>,
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AddressErrors {
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn for_field(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

/// Address form as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressInput {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub landmark: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub address_type: AddressType,
}

impl AddressInput {
    /// Fill blank city/state from the pincode table, if the pincode is known.
    pub fn autofill(&mut self, table: &DeliveryTable) -> bool {
        let Some(entry) = table.lookup(self.zip_code.trim()) else {
            return false;
        };
        if self.city.trim().is_empty() {
            self.city = entry.city.clone();
        }
        if self.state.trim().is_empty() {
            self.state = entry.state.clone();
        }
        true
    }

    /// Validate every field at once.
    pub fn validate(&self) -> Result<Address, AddressErrors> {
        let mut errors = Vec::new();

        let mut required = |field: &'static str, value: &str| {
            if value.trim().is_empty() {
                errors.push(FieldError {
                    field,
                    message: "is required".to_string(),
                });
            }
        };
        required("full_name", &self.full_name);
        required("street", &self.street);
        required("city", &self.city);
        required("state", &self.state);

        let phone = self.phone.trim();
        if !is_digits(phone, 10) {
            errors.push(FieldError {
                field: "phone",
                message: "must be exactly 10 digits".to_string(),
            });
        }

        let zip_code = self.zip_code.trim();
        if !is_digits(zip_code, 6) {
            errors.push(FieldError {
                field: "zip_code",
                message: "must be exactly 6 digits".to_string(),
            });
        }

        if !errors.is_empty() {
            return Err(AddressErrors { errors });
        }

        let landmark = self.landmark.trim();
        Ok(Address {
            full_name: self.full_name.trim().to_string(),
            phone: phone.to_string(),
            street: self.street.trim().to_string(),
            landmark: (!landmark.is_empty()).then(|| landmark.to_string()),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            zip_code: zip_code.to_string(),
            address_type: self.address_type,
        })
    }
}

fn is_digits(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

/// A validated delivery address. Only obtainable through [`AddressInput::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    full_name: String,
    phone: String,
    street: String,
    landmark: Option<String>,
    city: String,
    state: String,
    zip_code: String,
    address_type: AddressType,
}

impl Address {
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn street(&self) -> &str {
        &self.street
    }

    pub fn landmark(&self) -> Option<&str> {
        self.landmark.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn zip_code(&self) -> &str {
        &self.zip_code
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }
}

impl ValueObject for Address {}

impl From<&Address> for AddressInput {
    fn from(address: &Address) -> Self {
        Self {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            street: address.street.clone(),
            landmark: address.landmark.clone().unwrap_or_default(),
            city: address.city.clone(),
            state: address.state.clone(),
            zip_code: address.zip_code.clone(),
            address_type: address.address_type,
        }
    }
}

/// The customer's saved addresses, offered for one-click selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    saved: Vec<Address>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save an address; an identical address is not saved twice.
    pub fn save(&mut self, address: Address) -> usize {
        if let Some(index) = self.saved.iter().position(|a| *a == address) {
            return index;
        }
        self.saved.push(address);
        self.saved.len() - 1
    }

    pub fn get(&self, index: usize) -> DomainResult<&Address> {
        self.saved.get(index).ok_or_else(DomainError::not_found)
    }

    pub fn addresses(&self) -> &[Address] {
        &self.saved
    }

    pub fn len(&self) -> usize {
        self.saved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}
