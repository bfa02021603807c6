use anyhow::anyhow;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{enums::billing_intervals::BillingInterval, plans::PlanFeatures},
    infra::db::postgres::schema::plans,
};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: BillingInterval,
    pub external_id: String,
    pub active: bool,
    pub features: PlanFeatures,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row used for Diesel queries. Interval stays as text and features as JSON.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable, AsChangeset)]
#[diesel(table_name = plans)]
pub struct PlanRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: String,
    pub external_id: String,
    pub active: bool,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PlanRow> for PlanEntity {
    type Error = anyhow::Error;

    fn try_from(value: PlanRow) -> Result<Self, Self::Error> {
        let interval = BillingInterval::from_str(&value.interval)
            .ok_or_else(|| anyhow!("plan {} has unknown interval {:?}", value.id, value.interval))?;
        let features = serde_json::from_value(value.features).unwrap_or_default();

        Ok(Self {
            id: value.id,
            name: value.name,
            description: value.description,
            amount_minor: value.amount_minor,
            currency: value.currency,
            interval,
            external_id: value.external_id,
            active: value.active,
            features,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl From<&PlanEntity> for PlanRow {
    fn from(value: &PlanEntity) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
            description: value.description.clone(),
            amount_minor: value.amount_minor,
            currency: value.currency.clone(),
            interval: value.interval.to_string(),
            external_id: value.external_id.clone(),
            active: value.active,
            features: value.features.to_json(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = plans)]
pub struct InsertPlanEntity {
    pub name: String,
    pub description: String,
    pub amount_minor: i64,
    pub currency: String,
    pub interval: String,
    pub external_id: String,
    pub active: bool,
    pub features: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_row(interval: &str, features: serde_json::Value) -> PlanRow {
        let now = Utc::now();
        PlanRow {
            id: Uuid::new_v4(),
            name: "Pro".to_string(),
            description: "Pro plan".to_string(),
            amount_minor: 4990,
            currency: "brl".to_string(),
            interval: interval.to_string(),
            external_id: "price_pro".to_string(),
            active: true,
            features,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn row_converts_into_entity_with_typed_interval() {
        let row = sample_row("year", json!({ "max_workouts": 20 }));

        let plan = PlanEntity::try_from(row).unwrap();

        assert_eq!(plan.interval, BillingInterval::Year);
        assert_eq!(plan.features.get("max_workouts"), Some(&json!(20)));
    }

    #[test]
    fn unknown_interval_is_rejected() {
        let row = sample_row("week", json!({}));

        assert!(PlanEntity::try_from(row).is_err());
    }

    #[test]
    fn non_object_features_fall_back_to_empty() {
        let row = sample_row("month", json!("not-a-map"));

        let plan = PlanEntity::try_from(row).unwrap();

        assert!(plan.features.is_empty());
    }
}
