//! Who is checking out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use bookstore_core::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    name: Option<String>,
    email: String,
    guest: bool,
}

impl Customer {
    /// A signed-in customer as reported by the identity provider.
    pub fn registered(name: impl Into<String>, email: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name must not be empty"));
        }
        Ok(Self {
            name: Some(name.trim().to_string()),
            email: validate_email(email.into())?,
            guest: false,
        })
    }

    /// A guest who only leaves an email for order updates.
    pub fn guest(email: impl Into<String>) -> DomainResult<Self> {
        Ok(Self {
            name: None,
            email: validate_email(email.into())?,
            guest: true,
        })
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn is_guest(&self) -> bool {
        self.guest
    }
}

fn validate_email(email: String) -> DomainResult<String> {
    let email = email.trim().to_string();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}

/// Source of the signed-in identity. Read once when checkout is entered and
/// again when the Login step completes; checkout never authenticates anyone.
pub trait IdentityProvider {
    fn current_customer(&self) -> Option<Customer>;

    fn is_signed_in(&self) -> bool {
        self.current_customer().is_some()
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn current_customer(&self) -> Option<Customer> {
        (**self).current_customer()
    }
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for Arc<T> {
    fn current_customer(&self) -> Option<Customer> {
        (**self).current_customer()
    }
}

/// Nobody is signed in.
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn current_customer(&self) -> Option<Customer> {
        None
    }
}

/// A fixed signed-in customer.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    customer: Customer,
}

impl StaticIdentity {
    pub fn new(customer: Customer) -> Self {
        Self { customer }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_customer(&self) -> Option<Customer> {
        Some(self.customer.clone())
    }
}
