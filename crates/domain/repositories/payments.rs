use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payments::{InsertPaymentEntity, PaymentEntity};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    async fn create(&self, payment: InsertPaymentEntity) -> Result<PaymentEntity>;

    /// Full-record write keyed by `payment.id`. Returns the stored row.
    async fn update(&self, payment: PaymentEntity) -> Result<PaymentEntity>;

    async fn find_by_id(&self, payment_id: Uuid) -> Result<Option<PaymentEntity>>;

    async fn find_by_user_id(&self, user_id: Uuid) -> Result<Vec<PaymentEntity>>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<PaymentEntity>>;
}
