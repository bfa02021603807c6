use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result};

use super::{
    config_model::{BackendServer, Database, DotEnvyConfig, Stripe},
    stage::Stage,
};

const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const DEFAULT_STRIPE_TIMEOUT_SECS: u64 = 10;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    load_from(|key| std::env::var(key).ok())
}

pub(crate) fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let stage = lookup("STAGE")
        .map(|raw| Stage::try_from(&raw).unwrap_or_default())
        .unwrap_or_default();

    let backend_server = BackendServer {
        port: parse_required(&lookup, "SERVER_PORT")?,
        body_limit: parse_required(&lookup, "SERVER_BODY_LIMIT")?,
        timeout: parse_required(&lookup, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required(&lookup, "DATABASE_URL")?,
    };

    let stripe = Stripe {
        secret_key: required(&lookup, "STRIPE_SECRET_KEY")?,
        webhook_secret: required(&lookup, "STRIPE_WEBHOOK_SECRET")?,
        api_base: optional(&lookup, "STRIPE_API_BASE")
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string()),
        webhook_tolerance_secs: parse_optional(&lookup, "STRIPE_WEBHOOK_TOLERANCE_SECS")?
            .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        request_timeout: Duration::from_secs(
            parse_optional(&lookup, "STRIPE_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_STRIPE_TIMEOUT_SECS),
        ),
    };

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        stripe,
    })
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).with_context(|| format!("{key} is not set"))
}

fn parse_required<F, T>(lookup: &F, key: &str) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(lookup, key)?
        .trim()
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn parse_optional<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(lookup, key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("{key} is invalid"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("SERVER_PORT", "8080"),
            ("SERVER_BODY_LIMIT", "10"),
            ("SERVER_TIMEOUT", "30"),
            ("DATABASE_URL", "postgres://localhost/payments"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ])
    }

    fn load_with(env: HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        load_from(|key| env.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn loads_required_values_and_stripe_defaults() {
        let config = load_with(base_env()).unwrap();

        assert_eq!(config.stage, Stage::Local);
        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.backend_server.body_limit, 10);
        assert_eq!(config.database.url, "postgres://localhost/payments");
        assert_eq!(config.stripe.api_base, "https://api.stripe.com");
        assert_eq!(config.stripe.webhook_tolerance_secs, 300);
        assert_eq!(config.stripe.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn optional_stripe_values_override_defaults() {
        let mut env = base_env();
        env.insert("STAGE", "production");
        env.insert("STRIPE_API_BASE", "http://localhost:12111");
        env.insert("STRIPE_WEBHOOK_TOLERANCE_SECS", "60");
        env.insert("STRIPE_TIMEOUT_SECS", "3");

        let config = load_with(env).unwrap();

        assert_eq!(config.stage, Stage::Production);
        assert_eq!(config.stripe.api_base, "http://localhost:12111");
        assert_eq!(config.stripe.webhook_tolerance_secs, 60);
        assert_eq!(config.stripe.request_timeout, Duration::from_secs(3));
    }

    #[test]
    fn missing_required_value_names_the_variable() {
        let mut env = base_env();
        env.remove("STRIPE_WEBHOOK_SECRET");

        let err = load_with(env).unwrap_err();

        assert!(err.to_string().contains("STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn unparsable_port_is_reported() {
        let mut env = base_env();
        env.insert("SERVER_PORT", "eighty");

        let err = load_with(env).unwrap_err();

        assert_eq!(err.to_string(), "SERVER_PORT is invalid");
    }
}
