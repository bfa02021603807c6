pub mod enums;
pub mod gateway_events;
pub mod metadata;
pub mod payments;
pub mod plans;
pub mod subscriptions;
