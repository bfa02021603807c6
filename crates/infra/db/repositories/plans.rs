use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain;
use crate::infra::db::postgres::{postgres_connection::PgPoolSquad, schema::plans};
use domain::{
    entities::plans::{InsertPlanEntity, PlanEntity, PlanRow},
    repositories::plans::PlanRepository,
};

pub struct PlanPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PlanPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PlanRepository for PlanPostgres {
    async fn create(&self, plan: InsertPlanEntity) -> Result<PlanEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = insert_into(plans::table)
            .values(&plan)
            .returning(PlanRow::as_returning())
            .get_result::<PlanRow>(&mut conn)?;

        row.try_into()
    }

    async fn update(&self, plan: PlanEntity) -> Result<PlanEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut changes = PlanRow::from(&plan);
        changes.updated_at = Utc::now();

        let row = update(plans::table.find(changes.id))
            .set(&changes)
            .returning(PlanRow::as_returning())
            .get_result::<PlanRow>(&mut conn)?;

        row.try_into()
    }

    async fn find_by_id(&self, plan_id: Uuid) -> Result<Option<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = plans::table
            .find(plan_id)
            .select(PlanRow::as_select())
            .first::<PlanRow>(&mut conn)
            .optional()?;

        row.map(PlanEntity::try_from).transpose()
    }

    async fn list_active_plans(&self) -> Result<Vec<PlanEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = plans::table
            .filter(plans::active.eq(true))
            .order(plans::amount_minor.asc())
            .select(PlanRow::as_select())
            .load::<PlanRow>(&mut conn)?;

        rows.into_iter().map(PlanEntity::try_from).collect()
    }
}
