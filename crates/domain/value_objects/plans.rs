use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form feature map attached to a plan. Stored as JSONB in the database.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct PlanFeatures(Map<String, Value>);

impl PlanFeatures {
    pub fn new(features: Map<String, Value>) -> Self {
        Self(features)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
