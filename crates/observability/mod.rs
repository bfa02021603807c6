mod config;
mod layer;
mod notifier;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::{AlertWebhookProvider, Notifier};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Field that marks an event as needing a human to reconcile gateway and store.
pub const MANUAL_RECONCILIATION_FIELD: &str = "manual_reconciliation";

pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = config.alert.as_ref().map(|alert| {
        let notifier = Notifier::new(vec![Arc::new(AlertWebhookProvider::new(
            alert.webhook_url.clone(),
        ))]);

        AlertLayer::new(notifier, config.service_context.clone(), alert.min_level)
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "Observability config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled = config.alert.is_some(),
        "Observability initialized"
    );

    Ok(())
}
