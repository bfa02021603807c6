use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository {
    async fn create(&self, subscription: InsertSubscriptionEntity) -> Result<SubscriptionEntity>;

    /// Full-record write keyed by `subscription.id`. Returns the stored row.
    async fn update(&self, subscription: SubscriptionEntity) -> Result<SubscriptionEntity>;

    /// Most recently created subscription for the user, canceled or not.
    async fn find_latest_by_user_id(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    async fn find_by_external_id(&self, external_id: &str)
    -> Result<Option<SubscriptionEntity>>;
}
