use chrono::{DateTime, Utc};

/// Webhook event after signature verification, reduced to the kinds the
/// reconciliation logic acts on. Each variant carries only its own fields.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    PaymentSucceeded {
        external_id: String,
        paid_at: DateTime<Utc>,
    },
    PaymentFailed {
        external_id: String,
    },
    SubscriptionDeleted {
        external_id: String,
        canceled_at: DateTime<Utc>,
    },
    Unsupported {
        event_type: String,
    },
}

impl GatewayEvent {
    pub fn kind(&self) -> &str {
        match self {
            GatewayEvent::PaymentSucceeded { .. } => "payment_succeeded",
            GatewayEvent::PaymentFailed { .. } => "payment_failed",
            GatewayEvent::SubscriptionDeleted { .. } => "subscription_deleted",
            GatewayEvent::Unsupported { event_type } => event_type,
        }
    }
}

/// A verified webhook delivery: the gateway's event id plus the decoded event.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedWebhook {
    pub provider: &'static str,
    pub event_id: Option<String>,
    pub event_type: String,
    pub event: GatewayEvent,
}
