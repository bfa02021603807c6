use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::{
            payments::{InsertPaymentEntity, PaymentEntity},
            plans::{InsertPlanEntity, PlanEntity},
            subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
            webhook_events::InsertProcessedWebhookEventEntity,
        },
        repositories::{
            payments::PaymentRepository, plans::PlanRepository,
            subscriptions::SubscriptionRepository, webhook_events::WebhookEventRepository,
        },
        value_objects::{
            enums::{payment_statuses::PaymentStatus, subscription_statuses::SubscriptionStatus},
            gateway_events::{GatewayEvent, VerifiedWebhook},
            metadata::gateway_metadata,
            payments::CreatePaymentRequest,
            subscriptions::{CreatePlanRequest, CreateSubscriptionRequest},
        },
    },
    payments::stripe_client::{WebhookError, ts_to_datetime},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::payment_gateway::PaymentGateway;


/// What is known about the gateway side when a local step fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// No gateway call was made, or it was read-only.
    NotCalled,
    /// The gateway change stands but local state does not reflect it.
    Committed { external_id: String },
    /// The gateway change was followed by a best-effort cancellation.
    Compensated { external_id: String },
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("payment gateway request failed")]
    Gateway(#[source] anyhow::Error),
    #[error("store operation failed")]
    Store {
        #[source]
        source: anyhow::Error,
        outcome: GatewayOutcome,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("webhook signature verification failed")]
    Signature,
    #[error("invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("unsupported webhook event: {0}")]
    UnsupportedEvent(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::InvalidInput(_)
            | PaymentError::Signature
            | PaymentError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
            PaymentError::Gateway(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Conflict(_) => StatusCode::CONFLICT,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::UnsupportedEvent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::Store { .. } | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// True when the gateway holds state the store does not: someone has to
    /// line the two up by hand.
    pub fn requires_manual_reconciliation(&self) -> bool {
        matches!(
            self,
            PaymentError::Store {
                outcome: GatewayOutcome::Committed { .. },
                ..
            }
        )
    }

    fn store(source: anyhow::Error) -> Self {
        PaymentError::Store {
            source,
            outcome: GatewayOutcome::NotCalled,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PaymentError>;

pub struct PaymentUseCase<Pay, Sub, P, Evt, Gateway>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gateway: PaymentGateway + 'static,
{
    payment_repo: Arc<Pay>,
    subscription_repo: Arc<Sub>,
    plan_repo: Arc<P>,
    webhook_event_repo: Arc<Evt>,
    gateway: Arc<Gateway>,
}

impl<Pay, Sub, P, Evt, Gateway> PaymentUseCase<Pay, Sub, P, Evt, Gateway>
where
    Pay: PaymentRepository + Send + Sync + 'static,
    Sub: SubscriptionRepository + Send + Sync + 'static,
    P: PlanRepository + Send + Sync + 'static,
    Evt: WebhookEventRepository + Send + Sync + 'static,
    Gateway: PaymentGateway + 'static,
{
    pub fn new(
        payment_repo: Arc<Pay>,
        subscription_repo: Arc<Sub>,
        plan_repo: Arc<P>,
        webhook_event_repo: Arc<Evt>,
        gateway: Arc<Gateway>,
    ) -> Self {
        Self {
            payment_repo,
            subscription_repo,
            plan_repo,
            webhook_event_repo,
            gateway,
        }
    }

    /// Creates the gateway payment intent, then records it locally as pending.
    ///
    /// A local write failure after the intent exists is not compensated; the
    /// error carries [`GatewayOutcome::Committed`] instead.
    pub async fn create_payment(
        &self,
        input: CreatePaymentRequest,
    ) -> UseCaseResult<PaymentEntity> {
        let CreatePaymentRequest {
            user_id,
            amount_minor,
            currency,
            description,
            payment_method,
            metadata,
        } = input;

        info!(
            %user_id,
            amount_minor,
            currency = %currency,
            payment_method = %payment_method,
            "payments: create payment requested"
        );

        if amount_minor <= 0 {
            return Err(PaymentError::InvalidInput(
                "amount must be a positive number of minor units".to_string(),
            ));
        }
        if currency.trim().is_empty() {
            return Err(PaymentError::InvalidInput("currency is required".to_string()));
        }

        let intent = self
            .gateway
            .create_payment_intent(
                amount_minor,
                &currency,
                payment_method,
                gateway_metadata(&metadata),
            )
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    amount_minor,
                    currency = %currency,
                    error = ?err,
                    "payments: gateway payment intent creation failed"
                );
                PaymentError::Gateway(err)
            })?;

        if intent.id.trim().is_empty() {
            return Err(PaymentError::Gateway(anyhow!(
                "gateway returned a payment intent without an id"
            )));
        }

        let payment = self
            .payment_repo
            .create(InsertPaymentEntity {
                user_id,
                amount_minor,
                currency,
                status: PaymentStatus::Pending.to_string(),
                payment_method: payment_method.to_string(),
                description,
                external_id: intent.id.clone(),
                metadata: serde_json::Value::Object(metadata),
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    external_id = %intent.id,
                    manual_reconciliation = true,
                    db_error = ?err,
                    "payments: payment intent created but local record failed"
                );
                PaymentError::Store {
                    source: err,
                    outcome: GatewayOutcome::Committed {
                        external_id: intent.id.clone(),
                    },
                }
            })?;

        info!(
            %user_id,
            payment_id = %payment.id,
            external_id = %payment.external_id,
            "payments: payment created"
        );

        Ok(payment)
    }

    /// Subscribes the user at the gateway and records the subscription.
    ///
    /// Rejects the call before touching the gateway when the user already has
    /// an active subscription. A failed local write cancels the new remote
    /// subscription again.
    pub async fn create_subscription(
        &self,
        input: CreateSubscriptionRequest,
    ) -> UseCaseResult<SubscriptionEntity> {
        let CreateSubscriptionRequest {
            user_id,
            plan_id,
            customer_id,
            description,
            metadata,
        } = input;

        info!(
            %user_id,
            plan_id = %plan_id,
            "payments: create subscription requested"
        );

        if plan_id.trim().is_empty() || customer_id.trim().is_empty() {
            return Err(PaymentError::InvalidInput(
                "plan_id and customer_id are required".to_string(),
            ));
        }

        let existing = self
            .subscription_repo
            .find_latest_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "payments: failed to load current subscription before subscribe"
                );
                PaymentError::store(err)
            })?;

        if let Some(existing) = existing.filter(SubscriptionEntity::is_active) {
            warn!(
                %user_id,
                subscription_id = %existing.id,
                "payments: user already has an active subscription"
            );
            return Err(PaymentError::Conflict(
                "user already has an active subscription".to_string(),
            ));
        }

        let remote = self
            .gateway
            .create_subscription(&customer_id, &plan_id, &description)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    plan_id = %plan_id,
                    error = ?err,
                    "payments: gateway subscription creation failed"
                );
                PaymentError::Gateway(err)
            })?;

        let Some(current_period_end) = remote.period_end().and_then(ts_to_datetime) else {
            self.compensate_subscription(user_id, &remote.id).await;
            return Err(PaymentError::Gateway(anyhow!(
                "gateway subscription {} has no usable current_period_end",
                remote.id
            )));
        };

        let created = self
            .subscription_repo
            .create(InsertSubscriptionEntity {
                user_id,
                plan_id,
                status: remote.status.clone(),
                current_period_end,
                external_id: remote.id.clone(),
                metadata: serde_json::Value::Object(metadata),
            })
            .await;

        let subscription = match created {
            Ok(subscription) => subscription,
            Err(err) => {
                error!(
                    %user_id,
                    external_id = %remote.id,
                    db_error = ?err,
                    "payments: local subscription write failed after gateway creation"
                );
                self.compensate_subscription(user_id, &remote.id).await;
                return Err(PaymentError::Store {
                    source: err,
                    outcome: GatewayOutcome::Compensated {
                        external_id: remote.id,
                    },
                });
            }
        };

        info!(
            %user_id,
            subscription_id = %subscription.id,
            external_id = %subscription.external_id,
            status = %subscription.status,
            "payments: subscription created"
        );

        Ok(subscription)
    }

    /// Best effort: a failure here is logged and otherwise dropped.
    async fn compensate_subscription(&self, user_id: Uuid, external_id: &str) {
        warn!(
            %user_id,
            external_id,
            "payments: compensating by canceling gateway subscription"
        );

        if let Err(err) = self.gateway.cancel_subscription(external_id).await {
            error!(
                %user_id,
                external_id,
                manual_reconciliation = true,
                error = ?err,
                "payments: compensating cancellation failed"
            );
        }
    }

    pub async fn cancel_subscription(&self, user_id: Uuid) -> UseCaseResult<SubscriptionEntity> {
        info!(%user_id, "payments: cancel subscription requested");

        let mut subscription = self
            .subscription_repo
            .find_latest_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "payments: failed to load subscription for cancel"
                );
                PaymentError::store(err)
            })?
            .ok_or_else(|| {
                warn!(%user_id, "payments: no subscription to cancel");
                PaymentError::NotFound("subscription")
            })?;

        if !subscription.is_active() {
            warn!(
                %user_id,
                subscription_id = %subscription.id,
                "payments: subscription already canceled"
            );
            return Err(PaymentError::Conflict(
                "subscription is already canceled".to_string(),
            ));
        }

        self.gateway
            .cancel_subscription(&subscription.external_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    external_id = %subscription.external_id,
                    error = ?err,
                    "payments: gateway subscription cancel failed"
                );
                PaymentError::Gateway(err)
            })?;

        let external_id = subscription.external_id.clone();
        subscription.canceled_at = Some(Utc::now());
        subscription.status = SubscriptionStatus::Canceled.to_string();

        let subscription = self
            .subscription_repo
            .update(subscription)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    external_id = %external_id,
                    manual_reconciliation = true,
                    db_error = ?err,
                    "payments: gateway subscription canceled but local record failed"
                );
                PaymentError::Store {
                    source: err,
                    outcome: GatewayOutcome::Committed {
                        external_id: external_id.clone(),
                    },
                }
            })?;

        info!(
            %user_id,
            subscription_id = %subscription.id,
            "payments: subscription canceled"
        );

        Ok(subscription)
    }

    /// Verifies a gateway callback and applies it to the matching local record.
    ///
    /// Deliveries whose event id was already applied are acknowledged without
    /// touching any record.
    pub async fn handle_webhook(&self, payload: &[u8], signature: &str) -> UseCaseResult<()> {
        let VerifiedWebhook {
            provider,
            event_id,
            event_type,
            event,
        } = self
            .gateway
            .verify_and_decode_webhook(payload, signature)
            .map_err(|err| match err {
                WebhookError::Signature(reason) => {
                    warn!(reason = %reason, "payments: webhook signature rejected");
                    PaymentError::Signature
                }
                WebhookError::Payload(reason) => {
                    warn!(reason = %reason, "payments: webhook payload malformed");
                    PaymentError::InvalidWebhook(reason)
                }
            })?;

        info!(
            provider,
            event_id = ?event_id,
            event_type = %event_type,
            "payments: webhook verified"
        );

        if let GatewayEvent::Unsupported { event_type } = &event {
            debug!(event_type = %event_type, "payments: unsupported webhook event");
            return Err(PaymentError::UnsupportedEvent(event_type.clone()));
        }

        if let Some(event_id) = event_id.as_deref() {
            let processed = self
                .webhook_event_repo
                .is_processed(provider, event_id)
                .await
                .map_err(|err| {
                    error!(
                        provider,
                        event_id,
                        db_error = ?err,
                        "payments: failed to check webhook idempotency key"
                    );
                    PaymentError::store(err)
                })?;

            if processed {
                info!(provider, event_id, "payments: webhook event already processed");
                return Ok(());
            }
        }

        self.apply_event(event).await?;

        if let Some(event_id) = event_id {
            self.webhook_event_repo
                .mark_processed(InsertProcessedWebhookEventEntity {
                    provider: provider.to_string(),
                    event_id: event_id.clone(),
                    event_type,
                })
                .await
                .map_err(|err| {
                    error!(
                        provider,
                        event_id = %event_id,
                        db_error = ?err,
                        "payments: failed to record webhook idempotency key"
                    );
                    PaymentError::store(err)
                })?;
        }

        Ok(())
    }

    async fn apply_event(&self, event: GatewayEvent) -> UseCaseResult<()> {
        debug!(kind = event.kind(), "payments: applying webhook event");

        match event {
            GatewayEvent::PaymentSucceeded {
                external_id,
                paid_at,
            } => {
                self.apply_payment_status(&external_id, PaymentStatus::Success, Some(paid_at))
                    .await?;
            }
            GatewayEvent::PaymentFailed { external_id } => {
                self.apply_payment_status(&external_id, PaymentStatus::Failed, None)
                    .await?;
            }
            GatewayEvent::SubscriptionDeleted {
                external_id,
                canceled_at,
            } => {
                self.apply_subscription_deleted(&external_id, canceled_at)
                    .await?;
            }
            GatewayEvent::Unsupported { event_type } => {
                return Err(PaymentError::UnsupportedEvent(event_type));
            }
        }

        Ok(())
    }

    async fn apply_payment_status(
        &self,
        external_id: &str,
        next: PaymentStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> UseCaseResult<PaymentEntity> {
        let mut payment = self
            .payment_repo
            .find_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(
                    external_id,
                    db_error = ?err,
                    "payments: failed to load payment for webhook"
                );
                PaymentError::store(err)
            })?
            .ok_or_else(|| {
                warn!(external_id, "payments: webhook references unknown payment");
                PaymentError::NotFound("payment")
            })?;

        let current = PaymentStatus::from_str(&payment.status).ok_or_else(|| {
            PaymentError::Internal(anyhow!(
                "payment {} has unknown stored status {:?}",
                payment.id,
                payment.status
            ))
        })?;

        if !current.can_transition_to(next) {
            warn!(
                external_id,
                payment_id = %payment.id,
                current = %current,
                next = %next,
                "payments: rejected payment status transition"
            );
            return Err(PaymentError::Conflict(format!(
                "payment is already {} and cannot become {}",
                current, next
            )));
        }

        payment.status = next.to_string();
        if let Some(paid_at) = paid_at {
            payment.paid_at = Some(paid_at);
        }

        let payment = self.payment_repo.update(payment).await.map_err(|err| {
            error!(
                external_id,
                db_error = ?err,
                "payments: failed to update payment from webhook"
            );
            PaymentError::store(err)
        })?;

        info!(
            external_id,
            payment_id = %payment.id,
            status = %payment.status,
            "payments: payment reconciled from webhook"
        );

        Ok(payment)
    }

    async fn apply_subscription_deleted(
        &self,
        external_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> UseCaseResult<SubscriptionEntity> {
        let mut subscription = self
            .subscription_repo
            .find_by_external_id(external_id)
            .await
            .map_err(|err| {
                error!(
                    external_id,
                    db_error = ?err,
                    "payments: failed to load subscription for webhook"
                );
                PaymentError::store(err)
            })?
            .ok_or_else(|| {
                warn!(external_id, "payments: webhook references unknown subscription");
                PaymentError::NotFound("subscription")
            })?;

        if !subscription.is_active() {
            info!(
                external_id,
                subscription_id = %subscription.id,
                "payments: subscription already canceled; keeping original cancellation"
            );
            return Ok(subscription);
        }

        subscription.status = SubscriptionStatus::Canceled.to_string();
        subscription.canceled_at = Some(canceled_at);

        let subscription = self
            .subscription_repo
            .update(subscription)
            .await
            .map_err(|err| {
                error!(
                    external_id,
                    db_error = ?err,
                    "payments: failed to mark subscription canceled from webhook"
                );
                PaymentError::store(err)
            })?;

        info!(
            external_id,
            subscription_id = %subscription.id,
            "payments: subscription canceled from webhook"
        );

        Ok(subscription)
    }

    pub async fn list_active_plans(&self) -> UseCaseResult<Vec<PlanEntity>> {
        info!("payments: listing active plans");
        let plans = self.plan_repo.list_active_plans().await.map_err(|err| {
            error!(db_error = ?err, "payments: failed to list active plans");
            PaymentError::store(err)
        })?;

        let plans: Vec<PlanEntity> = plans.into_iter().filter(|plan| plan.active).collect();
        info!(plan_count = plans.len(), "payments: active plans loaded");
        Ok(plans)
    }

    pub async fn list_user_payments(&self, user_id: Uuid) -> UseCaseResult<Vec<PaymentEntity>> {
        self.payment_repo
            .find_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "payments: failed to list user payments");
                PaymentError::store(err)
            })
    }

    pub async fn get_payment(&self, payment_id: Uuid) -> UseCaseResult<PaymentEntity> {
        self.payment_repo
            .find_by_id(payment_id)
            .await
            .map_err(|err| {
                error!(%payment_id, db_error = ?err, "payments: failed to load payment");
                PaymentError::store(err)
            })?
            .ok_or(PaymentError::NotFound("payment"))
    }

    pub async fn get_current_subscription(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let subscription = self
            .subscription_repo
            .find_latest_by_user_id(user_id)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    db_error = ?err,
                    "payments: failed to load current subscription"
                );
                PaymentError::store(err)
            })?;

        Ok(subscription.filter(SubscriptionEntity::is_active))
    }

    pub async fn create_customer(&self, email: &str, name: &str) -> UseCaseResult<String> {
        if email.trim().is_empty() {
            return Err(PaymentError::InvalidInput("email is required".to_string()));
        }

        self.gateway
            .create_customer(email, name)
            .await
            .map_err(|err| {
                error!(error = ?err, "payments: gateway customer creation failed");
                PaymentError::Gateway(err)
            })
    }

    pub async fn create_plan(&self, input: CreatePlanRequest) -> UseCaseResult<PlanEntity> {
        let CreatePlanRequest {
            name,
            description,
            amount_minor,
            currency,
            interval,
            features,
        } = input;

        if name.trim().is_empty() || currency.trim().is_empty() {
            return Err(PaymentError::InvalidInput(
                "plan name and currency are required".to_string(),
            ));
        }
        if amount_minor < 0 {
            return Err(PaymentError::InvalidInput(
                "plan amount cannot be negative".to_string(),
            ));
        }

        let remote = self
            .gateway
            .create_plan(&name, amount_minor, &currency, interval)
            .await
            .map_err(|err| {
                error!(plan_name = %name, error = ?err, "payments: gateway plan creation failed");
                PaymentError::Gateway(err)
            })?;

        let plan = self
            .plan_repo
            .create(InsertPlanEntity {
                name,
                description,
                amount_minor,
                currency,
                interval: interval.to_string(),
                external_id: remote.id.clone(),
                active: true,
                features: features.to_json(),
            })
            .await
            .map_err(|err| {
                error!(
                    external_id = %remote.id,
                    manual_reconciliation = true,
                    db_error = ?err,
                    "payments: gateway plan created but local record failed"
                );
                PaymentError::Store {
                    source: err,
                    outcome: GatewayOutcome::Committed {
                        external_id: remote.id.clone(),
                    },
                }
            })?;

        info!(plan_id = %plan.id, external_id = %plan.external_id, "payments: plan created");
        Ok(plan)
    }

    pub async fn set_plan_active(&self, plan_id: Uuid, active: bool) -> UseCaseResult<PlanEntity> {
        let mut plan = self
            .plan_repo
            .find_by_id(plan_id)
            .await
            .map_err(|err| {
                error!(%plan_id, db_error = ?err, "payments: failed to load plan");
                PaymentError::store(err)
            })?
            .ok_or(PaymentError::NotFound("plan"))?;

        plan.active = active;

        let plan = self.plan_repo.update(plan).await.map_err(|err| {
            error!(%plan_id, db_error = ?err, "payments: failed to update plan");
            PaymentError::store(err)
        })?;

        info!(%plan_id, active, "payments: plan availability changed");
        Ok(plan)
    }
}
