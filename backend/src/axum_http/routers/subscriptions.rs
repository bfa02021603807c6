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
    value_objects::subscriptions::{
        CreateCustomerRequest, CreateCustomerResponse, CreateSubscriptionRequest, SubscriptionDto,
    },
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
        .route("/customers", post(create_customer::<Pay, Sub, P, Evt, Gw>))
        .route("/subscriptions", post(subscribe::<Pay, Sub, P, Evt, Gw>))
        .route(
            "/users/:user_id/subscription",
            get(current_subscription::<Pay, Sub, P, Evt, Gw>),
        )
        .route(
            "/users/:user_id/subscription/cancel",
            post(cancel_subscription::<Pay, Sub, P, Evt, Gw>),
        )
        .with_state(usecase)
}

pub async fn create_customer<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let customer_id = usecase.create_customer(&request.email, &request.name).await?;

    Ok((StatusCode::CREATED, Json(CreateCustomerResponse { customer_id })))
}

pub async fn subscribe<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Json(create_subscription_request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let subscription = usecase
        .create_subscription(create_subscription_request)
        .await?;

    Ok((StatusCode::CREATED, Json(SubscriptionDto::from(subscription))))
}

pub async fn current_subscription<Pay, Sub, P, Evt, Gw>(
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
    let subscription = usecase
        .get_current_subscription(user_id)
        .await?
        .ok_or(PaymentError::NotFound("subscription"))?;

    Ok(Json(SubscriptionDto::from(subscription)))
}

pub async fn cancel_subscription<Pay, Sub, P, Evt, Gw>(
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
    let subscription = usecase.cancel_subscription(user_id).await?;

    Ok(Json(SubscriptionDto::from(subscription)))
}
