use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{Level, warn};
use url::Url;

/// Target of the notifier's own events. The alert layer never forwards them.
pub(crate) const NOTIFIER_TARGET: &str = module_path!();

#[derive(Clone, Debug)]
pub(crate) struct AlertEvent {
    pub(crate) level: Level,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
    pub(crate) target: String,
    pub(crate) message: Option<String>,
    pub(crate) manual_reconciliation: bool,
    pub(crate) fields: BTreeMap<String, String>,
}

impl AlertEvent {
    pub(crate) fn render(&self) -> String {
        let mut lines = Vec::new();

        let headline = if self.manual_reconciliation {
            "MANUAL RECONCILIATION REQUIRED"
        } else {
            self.level.as_str()
        };
        lines.push(format!(
            "**{}** `{}` `{}` {}",
            self.service_name, self.environment, self.component, headline
        ));
        lines.push(format!(
            "`{}` `{}`",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.target
        ));

        if let Some(message) = self.message.as_ref().filter(|m| !m.trim().is_empty()) {
            lines.push(format!("> {}", message.trim()));
        }

        for (key, value) in &self.fields {
            lines.push(format!("- `{}` = `{}`", key, value));
        }

        truncate(lines.join("\n"), 2000)
    }
}

#[async_trait]
pub(crate) trait AlertProvider: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
    fn provider_name(&self) -> &'static str;
}

/// Hands alerts to a background task so logging never waits on the network.
#[derive(Clone)]
pub(crate) struct Notifier {
    tx: mpsc::Sender<AlertEvent>,
}

impl Notifier {
    pub(crate) fn new(providers: Vec<Arc<dyn AlertProvider>>) -> Self {
        let (tx, mut rx) = mpsc::channel::<AlertEvent>(256);

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                for provider in &providers {
                    if let Err(error) = provider.send(&event).await {
                        warn!(
                            provider = provider.provider_name(),
                            error = %error,
                            "Alert provider failed"
                        );
                    }
                }
            }
        });

        Self { tx }
    }

    pub(crate) fn try_notify(&self, event: AlertEvent) {
        if let Err(err) = self.tx.try_send(event) {
            match err {
                mpsc::error::TrySendError::Full(_) => warn!("Alert queue full; dropping event"),
                mpsc::error::TrySendError::Closed(_) => warn!("Alert queue closed; dropping event"),
            }
        }
    }
}

/// Posts to an incoming-webhook URL. The body carries both `content` and
/// `text` so Discord and Slack style endpoints accept it.
pub(crate) struct AlertWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookProvider {
    pub(crate) fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            webhook_url,
            client,
        }
    }
}

#[async_trait]
impl AlertProvider for AlertWebhookProvider {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let content = event.render();

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": content, "text": content }))
            .send()
            .await
            // reqwest errors echo the URL, which holds the webhook token.
            .map_err(|err| anyhow!("alert webhook request failed (timeout: {})", err.is_timeout()))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn provider_name(&self) -> &'static str {
        "alert_webhook"
    }
}

fn truncate(content: String, limit: usize) -> String {
    const SUFFIX: &str = "\n… (truncated)";

    if content.chars().count() <= limit {
        return content;
    }

    let allowed = limit.saturating_sub(SUFFIX.chars().count());
    let mut truncated: String = content.chars().take(allowed).collect();
    truncated.push_str(SUFFIX);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(manual_reconciliation: bool) -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "payments".to_string(),
            environment: "production".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::payments".to_string(),
            message: Some("payments: store write failed".to_string()),
            manual_reconciliation,
            fields: BTreeMap::from([("external_id".to_string(), "pi_1".to_string())]),
        }
    }

    #[test]
    fn render_flags_manual_reconciliation() {
        let rendered = sample(true).render();

        assert!(rendered.contains("MANUAL RECONCILIATION REQUIRED"));
        assert!(rendered.contains("> payments: store write failed"));
        assert!(rendered.contains("`external_id` = `pi_1`"));
    }

    #[test]
    fn render_uses_level_otherwise() {
        assert!(sample(false).render().contains("ERROR"));
    }

    #[test]
    fn truncate_caps_length() {
        let long = "x".repeat(5000);

        let truncated = truncate(long, 2000);

        assert_eq!(truncated.chars().count(), 2000);
        assert!(truncated.ends_with("(truncated)"));
    }
}
