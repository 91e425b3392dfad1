use std::collections::HashMap;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::ItemSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub platforms: HashMap<String, PlatformConfig>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub items: Vec<ItemSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between rounds.
    pub interval: u64,
    /// Politeness delay between adapter calls within a round.
    pub platform_delay_secs: u64,
    /// Cap on records kept per round, cheapest first.
    pub max_results: usize,
    /// Pagination cap for adapters that scan listing pages.
    pub max_pages: u32,
    /// Bounded retry around each adapter's transport call.
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    /// Per-request timeout inside adapters, seconds.
    pub request_timeout: u64,
    pub user_agent: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: 300,
            platform_delay_secs: 2,
            max_results: 20,
            max_pages: 3,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            request_timeout: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/price_history.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: String,
    pub level: String,
    /// Directory for round summary artifacts.
    pub summary_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: "logs".to_string(),
            level: "info".to_string(),
            summary_dir: "data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    #[serde(default)]
    pub enabled: bool,
    pub base_url: String,
    /// Extra request headers, merged over the defaults.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Raw Cookie header, usually a logged-in session.
    #[serde(default)]
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub email: EmailConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub sender: String,
    pub password: String,
    pub receivers: Vec<String>,
    /// Implicit TLS on 465 vs STARTTLS.
    pub use_ssl: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    pub enabled: bool,
    pub url: String,
    pub style: WebhookStyle,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStyle {
    #[default]
    Plain,
    Dingtalk,
}

impl AppConfig {
    /// Load configuration from an explicit file, or from `config/default`
    /// plus an optional `config/local` overlay, with `SKINWATCH_*`
    /// environment variables on top.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        builder = match path {
            Some(p) => builder.add_source(File::from(p)),
            None => builder
                .add_source(File::with_name("config/default"))
                .add_source(File::with_name("config/local").required(false)),
        };
        let s = builder
            .add_source(Environment::with_prefix("SKINWATCH").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.interval == 0 {
            return Err(ConfigError::Message(
                "monitor.interval must be greater than 0".into(),
            ));
        }

        if self.items.is_empty() {
            return Err(ConfigError::Message("no items configured".into()));
        }

        for (name, platform) in self.enabled_platforms() {
            if Url::parse(&platform.base_url).is_err() {
                return Err(ConfigError::Message(format!(
                    "platform {}: invalid base_url '{}'",
                    name, platform.base_url
                )));
            }
        }

        for item in &self.items {
            self.validate_item(item)?;
        }

        let email = &self.notifications.email;
        if email.enabled {
            if email.smtp_server.is_empty() || email.sender.is_empty() {
                return Err(ConfigError::Message(
                    "email notification enabled but smtp_server/sender missing".into(),
                ));
            }
            if email.receivers.is_empty() {
                return Err(ConfigError::Message(
                    "email notification enabled but no receivers configured".into(),
                ));
            }
        }
        if self.notifications.webhook.enabled && self.notifications.webhook.url.is_empty() {
            return Err(ConfigError::Message(
                "webhook notification enabled but url missing".into(),
            ));
        }

        Ok(())
    }

    fn validate_item(&self, item: &ItemSpec) -> Result<(), ConfigError> {
        if item.name.is_empty() {
            return Err(ConfigError::Message("item with empty name".into()));
        }
        if !(0.0..=1.0).contains(&item.wear_min) || !(0.0..=1.0).contains(&item.wear_max) {
            return Err(ConfigError::Message(format!(
                "item {}: wear bounds must be within [0, 1]",
                item.name
            )));
        }
        if item.wear_min > item.wear_max {
            return Err(ConfigError::Message(format!(
                "item {}: wear_min exceeds wear_max",
                item.name
            )));
        }
        if item.target_price < 0.0 {
            return Err(ConfigError::Message(format!(
                "item {}: target_price must be non-negative",
                item.name
            )));
        }
        if item.platforms.is_empty() {
            return Err(ConfigError::Message(format!(
                "item {}: platforms must be non-empty",
                item.name
            )));
        }

        // Platform identifiers are checked here, once, rather than
        // re-discovered as runtime errors inside the adapters.
        for platform in &item.platforms {
            let enabled = self
                .platforms
                .get(platform)
                .map(|p| p.enabled)
                .unwrap_or(false);
            if !enabled {
                // Unknown or disabled platforms are skipped with a runtime
                // warning, not rejected at load.
                continue;
            }
            match platform.as_str() {
                "youpin" => {
                    if item.ids.youpin_template_id.is_none()
                        && item.ids.youpin_goods_list_url.is_none()
                    {
                        return Err(ConfigError::Message(format!(
                            "item {}: youpin requires youpin_template_id or youpin_goods_list_url",
                            item.name
                        )));
                    }
                }
                "ecosteam" => {
                    if item.ids.ecosteam_goods_url.is_none() {
                        return Err(ConfigError::Message(format!(
                            "item {}: ecosteam requires ecosteam_goods_url",
                            item.name
                        )));
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Enabled platforms in iteration order.
    pub fn enabled_platforms(&self) -> impl Iterator<Item = (&str, &PlatformConfig)> {
        self.platforms
            .iter()
            .filter(|(_, p)| p.enabled)
            .map(|(name, p)| (name.as_str(), p))
    }
}
