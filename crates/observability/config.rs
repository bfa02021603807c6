use std::env;
use tracing::Level;
use url::Url;

#[derive(Debug, Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Debug, Clone)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alert: Option<AlertConfig>,
    /// Collected while parsing and logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let alert = alert_from_lookup(&non_empty, &mut warnings);

        Self {
            service_context,
            alert,
            warnings,
        }
    }
}

fn alert_from_lookup<F>(lookup: &F, warnings: &mut Vec<String>) -> Option<AlertConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let enabled = lookup("ALERT_NOTIFY_ENABLED")
        .and_then(|raw| parse_bool(&raw))
        .unwrap_or(true);
    if !enabled {
        return None;
    }

    let raw_url = lookup("ALERT_WEBHOOK_URL")?;
    let webhook_url = match Url::parse(&raw_url) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds a token, so only the parse error is reported.
            warnings.push(format!(
                "ALERT_WEBHOOK_URL is set but invalid; alerts disabled (parse error: {err})"
            ));
            return None;
        }
    };

    let min_level = match lookup("ALERT_NOTIFY_LEVEL") {
        Some(raw) => parse_level(&raw).unwrap_or_else(|| {
            warnings.push(format!(
                "ALERT_NOTIFY_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    Some(AlertConfig {
        webhook_url,
        min_level,
    })
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_service_name_to_component() {
        let config = config_from(&[]);

        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert!(config.alert.is_none());
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn enables_alerts_with_valid_url() {
        let config = config_from(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/T000/B000"),
            ("ALERT_NOTIFY_LEVEL", "warn"),
        ]);

        let alert = config.alert.expect("alerts enabled");
        assert_eq!(alert.min_level, Level::WARN);
    }

    #[test]
    fn invalid_url_disables_alerts_with_warning() {
        let config = config_from(&[("ALERT_WEBHOOK_URL", "not a url")]);

        assert!(config.alert.is_none());
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn invalid_level_falls_back_to_error() {
        let config = config_from(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/x"),
            ("ALERT_NOTIFY_LEVEL", "loud"),
        ]);

        assert_eq!(config.alert.unwrap().min_level, Level::ERROR);
        assert_eq!(config.warnings.len(), 1);
    }

    #[test]
    fn explicit_disable_wins() {
        let config = config_from(&[
            ("ALERT_NOTIFY_ENABLED", "off"),
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/x"),
        ]);

        assert!(config.alert.is_none());
    }
}
