pub mod billing_intervals;
pub mod payment_methods;
pub mod payment_statuses;
pub mod subscription_statuses;
