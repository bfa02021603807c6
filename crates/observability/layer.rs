use super::MANUAL_RECONCILIATION_FIELD;
use super::config::ServiceContext;
use super::notifier::{AlertEvent, NOTIFIER_TARGET, Notifier};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

/// Forwards severe events, and any event flagged for manual reconciliation,
/// to the notifier.
#[derive(Clone)]
pub(crate) struct AlertLayer {
    notifier: Notifier,
    service_context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(notifier: Notifier, service_context: ServiceContext, min_level: Level) -> Self {
        Self {
            notifier,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    values: BTreeMap<String, String>,
    manual_reconciliation: bool,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value));
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == MANUAL_RECONCILIATION_FIELD {
            self.manual_reconciliation = value;
            return;
        }
        self.insert(field, value.to_string());
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // A failing provider must not feed alerts back into itself.
        if event.metadata().target() == NOTIFIER_TARGET {
            return;
        }

        let level = *event.metadata().level();

        let mut collector = FieldCollector::default();
        event.record(&mut collector);

        // tracing orders levels by verbosity: ERROR is the smallest.
        if level > self.min_level && !collector.manual_reconciliation {
            return;
        }

        let message = collector
            .values
            .remove("message")
            .map(|raw| unquote_debug_string(&raw));

        self.notifier.try_notify(AlertEvent {
            level,
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: event.metadata().target().to_string(),
            message,
            manual_reconciliation: collector.manual_reconciliation,
            fields: collector.values,
        });
    }
}

fn unquote_debug_string(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn redact(field_name: &str, value: String) -> String {
    let field = field_name.to_ascii_lowercase();
    let sensitive = ["secret", "password", "token", "authorization", "signature", "api_key"]
        .iter()
        .any(|needle| field.contains(needle));
    if sensitive {
        return "[REDACTED]".to_string();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::notifier::AlertProvider;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tracing_subscriber::layer::SubscriberExt;

    struct ChannelProvider {
        tx: mpsc::UnboundedSender<AlertEvent>,
    }

    #[async_trait]
    impl AlertProvider for ChannelProvider {
        async fn send(&self, event: &AlertEvent) -> Result<()> {
            self.tx.send(event.clone())?;
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "channel"
        }
    }

    fn context() -> ServiceContext {
        ServiceContext {
            service_name: "payments".to_string(),
            environment: "test".to_string(),
            component: "backend".to_string(),
        }
    }

    #[tokio::test]
    async fn forwards_errors_and_flagged_events_only() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(vec![Arc::new(ChannelProvider { tx })]);
        let subscriber = tracing_subscriber::registry().with(AlertLayer::new(
            notifier,
            context(),
            Level::ERROR,
        ));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("routine event");
            tracing::warn!(external_id = "pi_1", manual_reconciliation = true, "store write failed");
            tracing::error!(stripe_secret = "sk_live_x", "gateway down");
        });

        let first = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.manual_reconciliation);
        assert_eq!(first.message.as_deref(), Some("store write failed"));
        assert_eq!(first.fields.get("external_id").map(String::as_str), Some("pi_1"));

        let second = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.level, Level::ERROR);
        assert_eq!(
            second.fields.get("stripe_secret").map(String::as_str),
            Some("[REDACTED]")
        );

        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn notifier_failures_are_not_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(vec![Arc::new(ChannelProvider { tx })]);
        let subscriber = tracing_subscriber::registry().with(AlertLayer::new(
            notifier,
            context(),
            Level::WARN,
        ));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: NOTIFIER_TARGET, provider = "webhook", "Alert provider failed");
            tracing::warn!("stripe request slow");
        });

        let forwarded = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forwarded.message.as_deref(), Some("stripe request slow"));

        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[test]
    fn unquotes_debug_strings() {
        assert_eq!(unquote_debug_string("\"hello\""), "hello");
        assert_eq!(unquote_debug_string("plain"), "plain");
    }
}
