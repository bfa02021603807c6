use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::plans::{InsertPlanEntity, PlanEntity};

#[automock]
#[async_trait]
pub trait PlanRepository {
    async fn create(&self, plan: InsertPlanEntity) -> Result<PlanEntity>;
    async fn update(&self, plan: PlanEntity) -> Result<PlanEntity>;
    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>>;
    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>>;
}
