use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use crates::{
    domain::value_objects::{
        enums::{billing_intervals::BillingInterval, payment_methods::PaymentMethod},
        gateway_events::VerifiedWebhook,
    },
    payments::stripe_client::{
        StripeClient, StripePaymentIntent, StripePlan, StripeSubscription, WebhookError,
    },
};

/// Remote side of every reconciliation: the payment provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method: PaymentMethod,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripePaymentIntent>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        description: &str,
    ) -> AnyResult<StripeSubscription>;

    async fn cancel_subscription(&self, external_id: &str) -> AnyResult<StripeSubscription>;

    async fn create_customer(&self, email: &str, name: &str) -> AnyResult<String>;

    async fn create_plan(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: BillingInterval,
    ) -> AnyResult<StripePlan>;

    fn verify_and_decode_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedWebhook, WebhookError>;
}

#[async_trait]
impl PaymentGateway for StripeClient {
    async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method: PaymentMethod,
        metadata: HashMap<String, String>,
    ) -> AnyResult<StripePaymentIntent> {
        self.create_payment_intent(amount_minor, currency, payment_method.stripe_type(), metadata)
            .await
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        description: &str,
    ) -> AnyResult<StripeSubscription> {
        self.create_subscription(customer_id, plan_id, Some(description))
            .await
    }

    async fn cancel_subscription(&self, external_id: &str) -> AnyResult<StripeSubscription> {
        self.cancel_subscription(external_id).await
    }

    async fn create_customer(&self, email: &str, name: &str) -> AnyResult<String> {
        self.create_customer(email, name).await
    }

    async fn create_plan(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: BillingInterval,
    ) -> AnyResult<StripePlan> {
        self.create_plan(name, amount_minor, currency, interval).await
    }

    fn verify_and_decode_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<VerifiedWebhook, WebhookError> {
        self.verify_and_decode_webhook(payload, signature)
    }
}
