use std::collections::HashMap;

use serde_json::{Map, Value};

/// Caller-supplied metadata. Kept whole on local records.
pub type Metadata = Map<String, Value>;

/// Projects metadata onto what the gateway accepts: string values only.
/// Numbers, booleans, nulls and nested values are dropped rather than coerced.
pub fn gateway_metadata(metadata: &Metadata) -> HashMap<String, String> {
    metadata
        .iter()
        .filter_map(|(key, value)| match value {
            Value::String(text) => Some((key.clone(), text.clone())),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keeps_only_string_values() {
        let metadata = json!({
            "order_ref": "A-100",
            "attempt": 2,
            "gift": true,
            "nested": { "coach": "ana" },
            "note": null,
            "channel": "app"
        });
        let metadata = metadata.as_object().unwrap().clone();

        let projected = gateway_metadata(&metadata);

        assert_eq!(projected.len(), 2);
        assert_eq!(projected.get("order_ref").map(String::as_str), Some("A-100"));
        assert_eq!(projected.get("channel").map(String::as_str), Some("app"));
        assert!(!projected.contains_key("attempt"));
    }

    #[test]
    fn empty_metadata_projects_to_empty_map() {
        assert!(gateway_metadata(&Metadata::new()).is_empty());
    }
}
