use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::value_objects::{
    enums::billing_intervals::BillingInterval,
    gateway_events::{GatewayEvent, VerifiedWebhook},
};

type HmacSha256 = Hmac<Sha256>;

pub const PROVIDER: &str = "stripe";

/// Everything the client needs, passed in at construction. Nothing is kept in
/// process-wide state.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub api_base: String,
    pub webhook_tolerance_secs: i64,
    pub request_timeout: Duration,
}

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    config: StripeConfig,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook signature rejected: {0}")]
    Signature(String),
    #[error("webhook payload malformed: {0}")]
    Payload(String),
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
    decline_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: Option<String>,
    pub created: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub current_period_end: Option<i64>,
    pub canceled_at: Option<i64>,
    #[serde(default)]
    pub items: StripeSubscriptionItems,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripeSubscriptionItem {
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StripePlan {
    pub id: String,
}

impl StripeSubscription {
    /// Returns the subscription period end timestamp, falling back to the first item when needed.
    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end.or_else(|| {
            self.items
                .data
                .first()
                .and_then(|item| item.current_period_end)
        })
    }
}

pub fn ts_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(ts, 0).single()
}

impl StripeClient {
    pub fn new(config: StripeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build stripe http client")?;

        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn ensure_success(
        resp: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error);

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            stripe_error_message = ?details.as_ref().and_then(|d| d.message.as_deref()),
            stripe_decline_code = ?details.as_ref().and_then(|d| d.decline_code.as_deref()),
            context = %context,
            "stripe api request failed"
        );

        anyhow::bail!(
            "Stripe API request failed: {} (status {}, request_id={:?})",
            context,
            status,
            request_id
        );
    }

    async fn post_form<T>(&self, path: &str, body: &[(String, String)], context: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(self.url(path))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(body)
            .send()
            .await
            .with_context(|| format!("stripe request failed: {context}"))?;
        let resp = Self::ensure_success(resp, context).await?;

        resp.json::<T>()
            .await
            .with_context(|| format!("stripe response could not be decoded: {context}"))
    }

    /// https://stripe.com/docs/api/payment_intents/create
    pub async fn create_payment_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        payment_method_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<StripePaymentIntent> {
        let mut body = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "payment_method_types[0]".to_string(),
                payment_method_type.to_string(),
            ),
        ];

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        self.post_form("payment_intents", &body, "create payment intent")
            .await
    }

    /// https://stripe.com/docs/api/customers/create
    pub async fn create_customer(&self, email: &str, name: &str) -> Result<String> {
        let body = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];

        #[derive(Deserialize)]
        struct CustomerResp {
            id: String,
        }

        let parsed: CustomerResp = self
            .post_form("customers", &body, "create customer")
            .await?;
        Ok(parsed.id)
    }

    /// https://stripe.com/docs/api/plans/create
    pub async fn create_plan(
        &self,
        name: &str,
        amount_minor: i64,
        currency: &str,
        interval: BillingInterval,
    ) -> Result<StripePlan> {
        let body = vec![
            ("nickname".to_string(), name.to_string()),
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            ("interval".to_string(), interval.to_string()),
            ("product[name]".to_string(), name.to_string()),
        ];

        self.post_form("plans", &body, "create plan").await
    }

    /// https://stripe.com/docs/api/subscriptions/create
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        plan_id: &str,
        description: Option<&str>,
    ) -> Result<StripeSubscription> {
        let mut body = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), plan_id.to_string()),
        ];

        if let Some(description) = description.filter(|value| !value.trim().is_empty()) {
            body.push(("description".to_string(), description.to_string()));
        }

        self.post_form("subscriptions", &body, "create subscription")
            .await
    }

    /// Cancels immediately. https://stripe.com/docs/api/subscriptions/cancel
    pub async fn cancel_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> Result<StripeSubscription> {
        let resp = self
            .http
            .delete(self.url(&format!("subscriptions/{}", provider_subscription_id)))
            .header(AUTHORIZATION, format!("Bearer {}", self.config.secret_key))
            .send()
            .await
            .context("stripe request failed: cancel subscription")?;
        let resp = Self::ensure_success(resp, "cancel subscription").await?;

        let subscription: StripeSubscription = resp
            .json()
            .await
            .context("stripe response could not be decoded: cancel subscription")?;
        Ok(subscription)
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, WebhookError> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now().timestamp())
    }

    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<StripeEvent, WebhookError> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',') {
            let part = part.trim();
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::Signature("missing timestamp".to_string()))?;
        if signatures.is_empty() {
            return Err(WebhookError::Signature("missing v1 signature".to_string()));
        }

        let issued_at: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::Signature("timestamp is not numeric".to_string()))?;
        let tolerance = u64::try_from(self.config.webhook_tolerance_secs).unwrap_or(0);
        if now.abs_diff(issued_at) > tolerance {
            warn!(
                issued_at,
                now,
                tolerance_secs = self.config.webhook_tolerance_secs,
                "stripe webhook timestamp outside tolerance"
            );
            return Err(WebhookError::Signature(
                "timestamp outside tolerance".to_string(),
            ));
        }

        let mut mac = HmacSha256::new_from_slice(self.config.webhook_secret.as_bytes())
            .map_err(|err| WebhookError::Signature(err.to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|provided| mac.clone().verify_slice(&provided).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(WebhookError::Signature("no matching v1 signature".to_string()));
        }

        serde_json::from_slice(payload).map_err(|err| WebhookError::Payload(err.to_string()))
    }

    /// Reduces a verified Stripe event to the closed set the service reconciles.
    pub fn decode_event(event: StripeEvent) -> Result<VerifiedWebhook, WebhookError> {
        #[derive(Deserialize)]
        struct ObjectRef {
            id: String,
            created: Option<i64>,
            canceled_at: Option<i64>,
        }

        let object = || -> Result<ObjectRef, WebhookError> {
            serde_json::from_value(event.data.object.clone())
                .map_err(|err| WebhookError::Payload(format!("{}: {}", event.type_, err)))
        };
        let timestamp = |value: Option<i64>, field: &str| -> Result<DateTime<Utc>, WebhookError> {
            value
                .and_then(ts_to_datetime)
                .ok_or_else(|| WebhookError::Payload(format!("{}: missing {}", event.type_, field)))
        };

        let decoded = match event.type_.as_str() {
            "payment_intent.succeeded" => {
                let intent = object()?;
                GatewayEvent::PaymentSucceeded {
                    paid_at: timestamp(event.created.or(intent.created), "created")?,
                    external_id: intent.id,
                }
            }
            "payment_intent.payment_failed" => GatewayEvent::PaymentFailed {
                external_id: object()?.id,
            },
            "customer.subscription.deleted" => {
                let subscription = object()?;
                GatewayEvent::SubscriptionDeleted {
                    canceled_at: timestamp(
                        subscription.canceled_at.or(event.created),
                        "canceled_at",
                    )?,
                    external_id: subscription.id,
                }
            }
            other => GatewayEvent::Unsupported {
                event_type: other.to_string(),
            },
        };

        Ok(VerifiedWebhook {
            provider: PROVIDER,
            event_id: event.id,
            event_type: event.type_,
            event: decoded,
        })
    }

    pub fn verify_and_decode_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<VerifiedWebhook, WebhookError> {
        let event = self.verify_webhook_signature(payload, signature_header)?;
        Self::decode_event(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";
    const NOW: i64 = 1_700_000_000;

    fn client() -> StripeClient {
        StripeClient::new(StripeConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: SECRET.to_string(),
            api_base: "https://api.stripe.com".to_string(),
            webhook_tolerance_secs: 300,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        format!(
            "t={},v1={}",
            timestamp,
            hex::encode(mac.finalize().into_bytes())
        )
    }

    fn event(type_: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": type_,
            "created": NOW,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn accepts_correctly_signed_payload() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));
        let header = sign(&payload, NOW);

        let parsed = client()
            .verify_webhook_signature_at(&payload, &header, NOW + 10)
            .unwrap();

        assert_eq!(parsed.type_, "payment_intent.succeeded");
        assert_eq!(parsed.id.as_deref(), Some("evt_1"));
    }

    #[test]
    fn accepts_any_matching_signature_during_secret_rotation() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));
        let valid = sign(&payload, NOW);
        let header = format!("t={},v1={},{}", NOW, "00".repeat(32), &valid[valid.find("v1=").unwrap()..]);

        assert!(
            client()
                .verify_webhook_signature_at(&payload, &header, NOW)
                .is_ok()
        );
    }

    #[test]
    fn rejects_tampered_payload() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));
        let header = sign(&payload, NOW);
        let tampered = event("payment_intent.succeeded", json!({ "id": "pi_2" }));

        let err = client()
            .verify_webhook_signature_at(&tampered, &header, NOW)
            .unwrap_err();

        assert!(matches!(err, WebhookError::Signature(_)));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));
        let header = sign(&payload, NOW - 301);

        let err = client()
            .verify_webhook_signature_at(&payload, &header, NOW)
            .unwrap_err();

        assert!(matches!(err, WebhookError::Signature(_)));
    }

    #[test]
    fn extreme_timestamps_are_outside_tolerance() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));
        let forged = format!("v1={}", "00".repeat(32));

        for issued_at in [i64::MIN, i64::MAX] {
            let header = format!("t={},{}", issued_at, forged);

            let err = client()
                .verify_webhook_signature_at(&payload, &header, NOW)
                .unwrap_err();

            assert!(
                matches!(&err, WebhookError::Signature(reason) if reason == "timestamp outside tolerance")
            );
        }
    }

    #[test]
    fn rejects_header_without_v1() {
        let payload = event("payment_intent.succeeded", json!({ "id": "pi_1" }));

        let err = client()
            .verify_webhook_signature_at(&payload, &format!("t={}", NOW), NOW)
            .unwrap_err();

        assert!(matches!(err, WebhookError::Signature(_)));
    }

    #[test]
    fn signed_but_malformed_body_is_a_payload_error() {
        let payload = b"{not json".to_vec();
        let header = sign(&payload, NOW);

        let err = client()
            .verify_webhook_signature_at(&payload, &header, NOW)
            .unwrap_err();

        assert!(matches!(err, WebhookError::Payload(_)));
    }

    fn parse(type_: &str, object: serde_json::Value) -> StripeEvent {
        serde_json::from_slice(&event(type_, object)).unwrap()
    }

    #[test]
    fn decodes_payment_succeeded_with_event_timestamp() {
        let decoded = StripeClient::decode_event(parse(
            "payment_intent.succeeded",
            json!({ "id": "pi_1", "created": NOW - 60 }),
        ))
        .unwrap();

        assert_eq!(decoded.provider, PROVIDER);
        assert_eq!(decoded.event_id.as_deref(), Some("evt_1"));
        assert_eq!(
            decoded.event,
            GatewayEvent::PaymentSucceeded {
                external_id: "pi_1".to_string(),
                paid_at: ts_to_datetime(NOW).unwrap(),
            }
        );
    }

    #[test]
    fn decodes_payment_failed() {
        let decoded =
            StripeClient::decode_event(parse("payment_intent.payment_failed", json!({ "id": "pi_9" })))
                .unwrap();

        assert_eq!(
            decoded.event,
            GatewayEvent::PaymentFailed {
                external_id: "pi_9".to_string()
            }
        );
    }

    #[test]
    fn decodes_subscription_deleted_with_cancellation_time() {
        let decoded = StripeClient::decode_event(parse(
            "customer.subscription.deleted",
            json!({ "id": "sub_1", "canceled_at": NOW - 5 }),
        ))
        .unwrap();

        assert_eq!(
            decoded.event,
            GatewayEvent::SubscriptionDeleted {
                external_id: "sub_1".to_string(),
                canceled_at: ts_to_datetime(NOW - 5).unwrap(),
            }
        );
    }

    #[test]
    fn other_event_types_decode_as_unsupported() {
        let decoded =
            StripeClient::decode_event(parse("invoice.paid", json!({ "id": "in_1" }))).unwrap();

        assert_eq!(
            decoded.event,
            GatewayEvent::Unsupported {
                event_type: "invoice.paid".to_string()
            }
        );
    }

    #[test]
    fn mapped_event_without_object_id_is_a_payload_error() {
        let err = StripeClient::decode_event(parse("payment_intent.succeeded", json!({})))
            .unwrap_err();

        assert!(matches!(err, WebhookError::Payload(_)));
    }

    #[test]
    fn period_end_falls_back_to_first_item() {
        let subscription: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "status": "active",
            "items": { "data": [{ "current_period_end": NOW }] }
        }))
        .unwrap();

        assert_eq!(subscription.period_end(), Some(NOW));
    }
}
