use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Success,
    Failed,
    Refunded,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Canceled => "canceled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            "canceled" => Some(PaymentStatus::Canceled),
            _ => None,
        }
    }

    /// Pending is the only state a payment can leave.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Transitions only move forward out of pending. Rewriting the current
    /// status is accepted so redelivered gateway events stay harmless.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        *self == next || !self.is_terminal()
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_moves_to_any_terminal_state() {
        for next in [
            PaymentStatus::Success,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
            PaymentStatus::Canceled,
        ] {
            assert!(PaymentStatus::Pending.can_transition_to(next));
        }
    }

    #[test]
    fn terminal_state_is_never_reopened() {
        assert!(!PaymentStatus::Success.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Success));
        assert!(!PaymentStatus::Canceled.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn rewriting_the_same_terminal_state_is_allowed() {
        assert!(PaymentStatus::Success.can_transition_to(PaymentStatus::Success));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Failed));
    }

    #[test]
    fn parses_stored_values() {
        assert_eq!(PaymentStatus::from_str("success"), Some(PaymentStatus::Success));
        assert_eq!(PaymentStatus::from_str("refunded"), Some(PaymentStatus::Refunded));
        assert_eq!(PaymentStatus::from_str("succeeded"), None);
    }
}
