use async_trait::async_trait;
use serde_json::json;

use crate::config::{WebhookConfig, WebhookStyle};
use crate::{AppError, Result};

use super::NotifyChannel;

/// Generic JSON webhook channel. The dingtalk style wraps the message in the
/// `msgtype: text` envelope that DingTalk/WeCom group robots expect.
pub struct WebhookChannel {
    client: reqwest::Client,
    config: WebhookConfig,
}

impl WebhookChannel {
    pub fn new(config: WebhookConfig) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::new(),
            config,
        })
    }

    fn payload(&self, title: &str, body: &str) -> serde_json::Value {
        match self.config.style {
            WebhookStyle::Plain => json!({"title": title, "body": body}),
            WebhookStyle::Dingtalk => json!({
                "msgtype": "text",
                "text": {"content": format!("{title}\n\n{body}")},
            }),
        }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, title: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&self.payload(title, body))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(AppError::Notification(format!(
                "webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
