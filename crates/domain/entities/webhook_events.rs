use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::infra::db::postgres::schema::processed_webhook_events;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = processed_webhook_events)]
#[diesel(primary_key(provider, event_id))]
pub struct ProcessedWebhookEventEntity {
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = processed_webhook_events)]
pub struct InsertProcessedWebhookEventEntity {
    pub provider: String,
    pub event_id: String,
    pub event_type: String,
}
