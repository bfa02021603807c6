use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
};
use crates::domain::repositories::{
    payments::PaymentRepository, plans::PlanRepository, subscriptions::SubscriptionRepository,
    webhook_events::WebhookEventRepository,
};
use tracing::info;

use crate::usecases::{
    payment_gateway::PaymentGateway,
    payments::{PaymentError, PaymentUseCase},
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub fn routes<Pay, Sub, P, Evt, Gw>(usecase: Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>) -> Router
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    Router::new()
        .route(
            "/webhooks/stripe",
            post(stripe_webhook::<Pay, Sub, P, Evt, Gw>),
        )
        .with_state(usecase)
}

/// Unsupported event types are acknowledged so the gateway stops redelivering them.
pub async fn stripe_webhook<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(PaymentError::Signature)?;

    match usecase.handle_webhook(&body, signature).await {
        Ok(()) => Ok(StatusCode::OK),
        Err(PaymentError::UnsupportedEvent(event_type)) => {
            info!(event_type = %event_type, "payments: acknowledging unsupported webhook event");
            Ok(StatusCode::OK)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use axum::{body::Body, http::Request};
    use crates::{
        domain::{
            repositories::{
                payments::MockPaymentRepository, plans::MockPlanRepository,
                subscriptions::MockSubscriptionRepository,
                webhook_events::MockWebhookEventRepository,
            },
            value_objects::gateway_events::{GatewayEvent, VerifiedWebhook},
        },
        payments::stripe_client::WebhookError,
    };
    use tower::ServiceExt;

    use super::*;
    use crate::usecases::payment_gateway::MockPaymentGateway;

    fn app(gateway: MockPaymentGateway) -> Router {
        let usecase = PaymentUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(MockPlanRepository::new()),
            Arc::new(MockWebhookEventRepository::new()),
            Arc::new(gateway),
        );

        routes(Arc::new(usecase))
    }

    fn webhook_request(signature: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhooks/stripe");
        if let Some(signature) = signature {
            builder = builder.header(STRIPE_SIGNATURE_HEADER, signature);
        }

        builder.body(Body::from("{}")).unwrap()
    }

    #[tokio::test]
    async fn unsupported_events_are_acknowledged() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_and_decode_webhook()
            .withf(|payload, signature| payload == b"{}" && signature == "t=1,v1=abc")
            .times(1)
            .returning(|_, _| {
                Ok(VerifiedWebhook {
                    provider: "stripe",
                    event_id: Some("evt_1".to_string()),
                    event_type: "invoice.created".to_string(),
                    event: GatewayEvent::Unsupported {
                        event_type: "invoice.created".to_string(),
                    },
                })
            });

        let response = app(gateway)
            .oneshot(webhook_request(Some("t=1,v1=abc")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_signature_header_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_and_decode_webhook().times(0);

        let response = app(gateway).oneshot(webhook_request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn invalid_signature_is_a_bad_request() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_and_decode_webhook()
            .returning(|_, _| Err(WebhookError::Signature("timestamp outside tolerance".to_string())));

        let response = app(gateway)
            .oneshot(webhook_request(Some("t=1,v1=stale")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
