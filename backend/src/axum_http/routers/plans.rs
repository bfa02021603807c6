use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
};
use crates::domain::{
    repositories::{
        payments::PaymentRepository, plans::PlanRepository,
        subscriptions::SubscriptionRepository, webhook_events::WebhookEventRepository,
    },
    value_objects::subscriptions::{CreatePlanRequest, PlanDto, SetPlanActiveRequest},
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
        .route(
            "/plans",
            get(list_plans::<Pay, Sub, P, Evt, Gw>).post(create_plan::<Pay, Sub, P, Evt, Gw>),
        )
        .route("/plans/:plan_id", patch(set_plan_active::<Pay, Sub, P, Evt, Gw>))
        .with_state(usecase)
}

pub async fn list_plans<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let plans = usecase.list_active_plans().await?;
    let plans: Vec<PlanDto> = plans.into_iter().map(PlanDto::from).collect();

    Ok(Json(plans))
}

pub async fn create_plan<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Json(create_plan_request): Json<CreatePlanRequest>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let plan = usecase.create_plan(create_plan_request).await?;

    Ok((StatusCode::CREATED, Json(PlanDto::from(plan))))
}

pub async fn set_plan_active<Pay, Sub, P, Evt, Gw>(
    State(usecase): State<Arc<PaymentUseCase<Pay, Sub, P, Evt, Gw>>>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<SetPlanActiveRequest>,
) -> Result<impl IntoResponse, PaymentError>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gw: PaymentGateway + 'static,
{
    let plan = usecase.set_plan_active(plan_id, request.active).await?;

    Ok(Json(PlanDto::from(plan)))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use chrono::Utc;
    use crates::domain::{
        entities::plans::PlanEntity,
        repositories::{
            payments::MockPaymentRepository, plans::MockPlanRepository,
            subscriptions::MockSubscriptionRepository, webhook_events::MockWebhookEventRepository,
        },
        value_objects::{enums::billing_intervals::BillingInterval, plans::PlanFeatures},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::usecases::payment_gateway::MockPaymentGateway;

    fn plan(name: &str, active: bool) -> PlanEntity {
        let now = Utc::now();
        PlanEntity {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: String::new(),
            amount_minor: 2990,
            currency: "brl".to_string(),
            interval: BillingInterval::Month,
            external_id: format!("price_{name}"),
            active,
            features: PlanFeatures::default(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn lists_only_active_plans_as_json() {
        let mut plan_repo = MockPlanRepository::new();
        plan_repo
            .expect_list_active_plans()
            .returning(|| Ok(vec![plan("basic", true), plan("retired", false)]));

        let usecase = PaymentUseCase::new(
            Arc::new(MockPaymentRepository::new()),
            Arc::new(MockSubscriptionRepository::new()),
            Arc::new(plan_repo),
            Arc::new(MockWebhookEventRepository::new()),
            Arc::new(MockPaymentGateway::new()),
        );

        let response = routes(Arc::new(usecase))
            .oneshot(Request::builder().uri("/plans").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let plans: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let plans = plans.as_array().unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0]["name"], "basic");
        assert_eq!(plans[0]["interval"], "month");
    }
}
