use async_trait::async_trait;
use tracing::{error, info};

use crate::config::NotificationsConfig;
use crate::models::PriceRecord;
use crate::Result;

pub mod email;
pub mod webhook;

pub use email::EmailChannel;
pub use webhook::WebhookChannel;

/// One alert delivery channel. Formatting beyond the shared message body and
/// the transport are the channel's concern.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, title: &str, body: &str) -> Result<()>;
}

/// Fan-out over the enabled channels. Fire-and-forget: a channel failure is
/// logged and does not affect the other channels or the caller.
pub struct NotifierSet {
    channels: Vec<Box<dyn NotifyChannel>>,
}

impl NotifierSet {
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let mut channels: Vec<Box<dyn NotifyChannel>> = Vec::new();
        if config.email.enabled {
            channels.push(Box::new(EmailChannel::new(config.email.clone())?));
        }
        if config.webhook.enabled {
            channels.push(Box::new(WebhookChannel::new(config.webhook.clone())?));
        }
        Ok(Self { channels })
    }

    pub fn with_channels(channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn send(&self, title: &str, content: &str, records: &[PriceRecord]) {
        let body = build_message(title, content, records);
        for channel in &self.channels {
            match channel.send(title, &body).await {
                Ok(()) => info!(channel = channel.name(), "alert sent"),
                Err(e) => {
                    error!(channel = channel.name(), error = %e, "alert delivery failed")
                }
            }
        }
    }
}

/// Shared plain-text alert body with a per-listing detail block.
fn build_message(title: &str, content: &str, records: &[PriceRecord]) -> String {
    let mut message = format!("{title}\n\n{content}\n\n");
    if !records.is_empty() {
        message.push_str("Listings:\n");
        for record in records {
            message.push_str(&format!(
                "- platform: {}\n  item: {}\n  price: ¥{:.2}\n  wear: {:.6}\n  url: {}\n\n",
                record.platform,
                record.item_name,
                record.price,
                record.wear,
                record.url.as_deref().unwrap_or("-"),
            ));
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    pub(crate) struct RecordingChannel {
        pub sent: Arc<Mutex<Vec<(String, String)>>>,
        pub fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, title: &str, body: &str) -> Result<()> {
            if self.fail {
                return Err(crate::AppError::Notification("boom".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_build_message_includes_listing_details() {
        let records = vec![PriceRecord::new(
            "buff",
            "AK-47 | Redline",
            90.0,
            0.2134,
            Some("https://buff.163.com/goods/1".to_string()),
        )];
        let message = build_message("[price alert] AK-47 | Redline", "1 listing", &records);
        assert!(message.contains("price: ¥90.00"));
        assert!(message.contains("wear: 0.213400"));
        assert!(message.contains("https://buff.163.com/goods/1"));
    }

    #[test]
    fn test_build_message_without_records() {
        let message = build_message("t", "c", &[]);
        assert_eq!(message, "t\n\nc\n\n");
    }

    #[tokio::test]
    async fn test_channel_failure_does_not_stop_fanout() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let set = NotifierSet::with_channels(vec![
            Box::new(RecordingChannel {
                sent: Arc::clone(&sent),
                fail: true,
            }),
            Box::new(RecordingChannel {
                sent: Arc::clone(&sent),
                fail: false,
            }),
        ]);

        set.send("title", "content", &[]).await;
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_disabled_config_builds_empty_set() {
        let set = NotifierSet::from_config(&NotificationsConfig::default()).unwrap();
        assert!(set.is_empty());
    }
}
