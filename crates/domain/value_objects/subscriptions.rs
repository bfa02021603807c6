use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{plans::PlanEntity, subscriptions::SubscriptionEntity},
    value_objects::{
        enums::billing_intervals::BillingInterval, metadata::Metadata, plans::PlanFeatures,
    },
};

#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub user_id: Uuid,
    pub plan_id: String,
    pub customer_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct SubscriptionDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: String,
    pub status: String,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub external_id: String,
    pub metadata: serde_json::Value,
}

impl From<SubscriptionEntity> for SubscriptionDto {
    fn from(value: SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            plan_id: value.plan_id,
            status: value.status,
            current_period_end: value.current_period_end,
            canceled_at: value.canceled_at,
            external_id: value.external_id,
            metadata: value.metadata,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PlanDto {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub features: PlanFeatures,
}

impl From<PlanEntity> for PlanDto {
    fn from(value: PlanEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            description: value.description,
            amount_minor: value.amount_minor,
            currency: value.currency,
            interval: value.interval,
            features: value.features,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    #[serde(default)]
    pub features: PlanFeatures,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCustomerResponse {
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPlanActiveRequest {
    pub active: bool,
}
