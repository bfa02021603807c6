use std::sync::Arc;

use axum::{Router, routing::get};
use crates::domain::repositories::{
    payments::PaymentRepository, plans::PlanRepository, subscriptions::SubscriptionRepository,
    webhook_events::WebhookEventRepository,
};

use crate::{
    axum_http::default_routers,
    usecases::{payment_gateway::PaymentGateway, payments::PaymentUseCase},
};

pub mod payments;
pub mod plans;
pub mod subscriptions;
pub mod webhooks;

/// Every `/api/v1` route backed by the payment use case.
pub fn routes<Pay, Sub, P, Evt, Gw>(usecase: Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>) -> Router
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    Router::new()
        .route("/health-check", get(default_routers::health_check))
        .merge(plans::routes(Arc::clone(&usecase)))
        .merge(payments::routes(Arc::clone(&usecase)))
        .merge(subscriptions::routes(Arc::clone(&usecase)))
        .merge(webhooks::routes(usecase))
}
