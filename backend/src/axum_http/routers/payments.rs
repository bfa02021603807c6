use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::domain::{
    repositories::{
        payments::PaymentRepository, plans::PlanRepository,
        subscriptions::SubscriptionRepository, webhook_events::WebhookEventRepository,
    },
    value_objects::payments::{CreatePaymentRequest, PaymentDto},
};
use uuid::Uuid;

use crate::usecases::{
    payment_gateway::PaymentGateway,
    payments::{PaymentError, PaymentUseCase},
};

pub fn routes<Pay, Sub, P, Evt, Gw>(usecase: Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>) -> Router
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    Router::new()
        .route("/payments", post(create_payment::<Pay, Sub, P, Evt, Gw>))
        .route("/payments/:payment_id", get(get_payment::<Pay, Sub, P, Evt, Gw>))
        .route(
            "/users/:user_id/payments",
            get(list_user_payments::<Pay, Sub, P, Evt, Gw>),
        )
        .with_state(usecase)
}

pub async fn create_payment<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Json(create_payment_request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let payment = usecase.create_payment(create_payment_request).await?;

    Ok((StatusCode::CREATED, Json(PaymentDto::from(payment))))
}

pub async fn get_payment<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Path(payment_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let payment = usecase.get_payment(payment_id).await?;

    Ok(Json(PaymentDto::from(payment)))
}

pub async fn list_user_payments<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let payments = usecase.list_user_payments(user_id).await?;
    let payments: Vec<PaymentDto> = payments.into_iter().map(PaymentDto::from).collect();

    Ok(Json(payments))
}
