use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, warn};

use crate::alert::engine::AlertEvent;
use crate::config::AlertsConfig;

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, event: &AlertEvent) -> Result<()>;
}

pub struct StdoutSink;

#[async_trait]
impl AlertSink for StdoutSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        println!("[SYSTEM ALERT] {} - {}", event.title, event.body);
        Ok(())
    }
}

pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        warn!(
            group = %event.group,
            count = event.count,
            "{} - {}",
            event.title,
            event.body
        );
        Ok(())
    }
}

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("herd-feed/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let req = if self.url.contains("discord.com/api/webhooks")
            || self.url.contains("discordapp.com/api/webhooks")
        {
            let content = format!("{}\n{}", event.title, event.body);
            self.client
                .post(&self.url)
                .json(&serde_json::json!({ "content": content }))
        } else {
            self.client.post(&self.url).json(event)
        };

        req.send().await?.error_for_status()?;
        Ok(())
    }
}

pub fn sinks_from_config(config: &AlertsConfig) -> Vec<Box<dyn AlertSink>> {
    let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogSink)];
    if config.enable_stdout {
        sinks.push(Box::new(StdoutSink));
    }
    if !config.webhook_url.trim().is_empty() {
        match WebhookSink::new(config.webhook_url.trim()) {
            Ok(sink) => sinks.push(Box::new(sink)),
            Err(err) => warn!("webhook sink disabled: {err:#}"),
        }
    }
    sinks
}

/// Sends every alert to every sink. Failures are logged and skipped; the
/// return value is the number of successful deliveries.
pub async fn dispatch_alerts(sinks: &[Box<dyn AlertSink>], alerts: &[AlertEvent]) -> usize {
    let mut delivered = 0;
    for alert in alerts {
        for sink in sinks {
            match sink.send(alert).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!("failed sending alert: {err:#}"),
            }
        }
    }
    if delivered > 0 {
        info!("delivered {delivered} alert notification(s)");
    }
    delivered
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{dispatch_alerts, sinks_from_config, AlertSink};
    use crate::alert::engine::AlertEvent;
    use crate::alert::rules::AlertEventKind;
    use crate::config::AlertsConfig;
    use crate::herd::Group;

    struct RecordingSink(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, event: &AlertEvent) -> Result<()> {
            self.0.lock().unwrap().push(event.title.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn send(&self, _event: &AlertEvent) -> Result<()> {
            Err(anyhow!("smtp relay unreachable"))
        }
    }

    fn alert() -> AlertEvent {
        AlertEvent {
            kind: AlertEventKind::FeedingShortfall,
            title: "2 feeding issues in Grower group".to_string(),
            body: "body".to_string(),
            group: Group::Grower,
            count: 2,
        }
    }

    #[test]
    fn failing_sink_does_not_stop_delivery() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sinks: Vec<Box<dyn AlertSink>> = vec![
            Box::new(FailingSink),
            Box::new(RecordingSink(Arc::clone(&seen))),
        ];
        let delivered = tokio_test::block_on(dispatch_alerts(&sinks, &[alert()]));
        assert_eq!(delivered, 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["2 feeding issues in Grower group".to_string()]
        );
    }

    #[test]
    fn config_controls_sinks() {
        let quiet = AlertsConfig {
            enable_stdout: false,
            ..AlertsConfig::default()
        };
        assert_eq!(sinks_from_config(&quiet).len(), 1);
        let loud = AlertsConfig {
            enable_stdout: true,
            webhook_url: "http://127.0.0.1:9/hook".to_string(),
            ..AlertsConfig::default()
        };
        assert_eq!(sinks_from_config(&loud).len(), 3);
    }
}
