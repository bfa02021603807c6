use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::webhook_events::InsertProcessedWebhookEventEntity;

/// Idempotency keys for gateway webhook deliveries.
#[automock]
#[async_trait]
pub trait WebhookEventRepository {
    async fn is_processed(&self, provider: &str, event_id: &str) -> Result<bool>;

    /// Records the event id. Recording an id twice is not an error.
    async fn mark_processed(&self, event: InsertProcessedWebhookEventEntity) -> Result<()>;
}
