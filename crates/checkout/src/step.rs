use serde::{Deserialize, Serialize};

/// Checkout steps in order. The discriminant is the step number shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    Login = 1,
    Address = 2,
    Payment = 3,
    Review = 4,
}

/// How a step indicator is rendered. Only completed steps are clickable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Current,
    Upcoming,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 4] = [
        CheckoutStep::Login,
        CheckoutStep::Address,
        CheckoutStep::Payment,
        CheckoutStep::Review,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.number() == number)
    }

    pub fn label(self) -> &'static str {
        match self {
            CheckoutStep::Login => "Login",
            CheckoutStep::Address => "Delivery Address",
            CheckoutStep::Payment => "Payment",
            CheckoutStep::Review => "Review Order",
        }
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    /// Status of `self` when the session is at `current`.
    pub fn status_relative_to(self, current: CheckoutStep) -> StepStatus {
        match self.cmp(&current) {
            core::cmp::Ordering::Less => StepStatus::Completed,
            core::cmp::Ordering::Equal => StepStatus::Current,
            core::cmp::Ordering::Greater => StepStatus::Upcoming,
        }
    }
}

impl core::fmt::Display for CheckoutStep {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.number(), self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_one_to_four() {
        let numbers: Vec<u8> = CheckoutStep::ALL.iter().map(|s| s.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert_eq!(CheckoutStep::from_number(3), Some(CheckoutStep::Payment));
        assert_eq!(CheckoutStep::from_number(5), None);
    }

    #[test]
    fn review_is_last() {
        assert_eq!(CheckoutStep::Payment.next(), Some(CheckoutStep::Review));
        assert_eq!(CheckoutStep::Review.next(), None);
    }

    #[test]
    fn status_is_relative_to_current_step() {
        let current = CheckoutStep::Payment;
        assert_eq!(CheckoutStep::Address.status_relative_to(current), StepStatus::Completed);
        assert_eq!(CheckoutStep::Payment.status_relative_to(current), StepStatus::Current);
        assert_eq!(CheckoutStep::Review.status_relative_to(current), StepStatus::Upcoming);
    }
}
