pub mod payment_gateway;
pub mod payments;
