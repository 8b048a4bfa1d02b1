//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: a validated
/// shipping address or a price breakdown has no identity of its own. To
/// "change" one, build a new one.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct Pincode(String);
///
/// impl ValueObject for Pincode {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
