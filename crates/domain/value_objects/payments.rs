use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::payments::PaymentEntity,
    value_objects::{enums::payment_methods::PaymentMethod, metadata::Metadata},
};

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub description: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct PaymentDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub status: String,
    pub payment_method: String,
    pub description: String,
    pub external_id: String,
    pub metadata: serde_json::Value,
    pub paid_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentEntity> for PaymentDto {
    fn from(value: PaymentEntity) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            amount_minor: value.amount_minor,
            currency: value.currency,
            status: value.status,
            payment_method: value.payment_method,
            description: value.description,
            external_id: value.external_id,
            metadata: value.metadata,
            paid_at: value.paid_at,
            refunded_at: value.refunded_at,
            canceled_at: value.canceled_at,
            created_at: value.created_at,
        }
    }
}
