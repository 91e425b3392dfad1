use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE, USER_AGENT};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::warn;

use crate::config::{AppConfig, MonitorConfig, PlatformConfig};
use crate::models::{ItemSpec, PriceRecord};
use crate::{AppError, Result};

pub mod buff;
pub mod ecosteam;
pub mod youpin;

pub use buff::BuffMonitor;
pub use ecosteam::EcosteamMonitor;
pub use youpin::YoupinMonitor;

/// One marketplace platform. Adapters own their transport state; network
/// calls, pagination and throttling stay behind this contract.
///
/// "No results" is `Ok(vec![])`, never an error. Returned records are
/// expected to be wear-range filtered and sorted by ascending price.
#[async_trait]
pub trait PlatformMonitor: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, item: &ItemSpec) -> Result<Vec<PriceRecord>>;
}

/// Platform identifier to adapter mapping, built once from configuration.
pub struct MonitorRegistry {
    monitors: HashMap<String, Box<dyn PlatformMonitor>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self {
            monitors: HashMap::new(),
        }
    }

    /// Construct adapters for every enabled platform in the configuration.
    /// Enabled platforms without a known adapter are ignored with a warning.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new();
        for (name, platform) in config.enabled_platforms() {
            let monitor: Box<dyn PlatformMonitor> = match name {
                "buff" => Box::new(BuffMonitor::new(platform, &config.monitor)?),
                "youpin" => Box::new(YoupinMonitor::new(platform, &config.monitor)?),
                "ecosteam" => Box::new(EcosteamMonitor::new(platform, &config.monitor)?),
                other => {
                    warn!(platform = other, "no adapter for enabled platform, ignoring");
                    continue;
                }
            };
            registry.register(monitor);
        }
        Ok(registry)
    }

    pub fn register(&mut self, monitor: Box<dyn PlatformMonitor>) {
        self.monitors.insert(monitor.name().to_string(), monitor);
    }

    pub fn get(&self, name: &str) -> Option<&dyn PlatformMonitor> {
        self.monitors.get(name).map(|m| m.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.monitors.keys().map(|k| k.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl Default for MonitorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the reqwest client an adapter owns: browser-like UA, configured
/// extra headers and session cookie, per-request timeout.
pub(crate) fn build_client(
    platform: &PlatformConfig,
    monitor: &MonitorConfig,
) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&monitor.user_agent)
            .map_err(|e| AppError::Internal(format!("invalid user agent: {e}")))?,
    );
    for (key, value) in &platform.headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| AppError::Internal(format!("invalid header name {key}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| AppError::Internal(format!("invalid header value for {key}: {e}")))?;
        headers.insert(name, value);
    }
    if let Some(cookie) = &platform.cookie {
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookie)
                .map_err(|e| AppError::Internal(format!("invalid cookie value: {e}")))?,
        );
    }

    let client = reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(monitor.request_timeout))
        .cookie_store(true)
        .build()?;
    Ok(client)
}

/// Bounded retry around a transport call. Wraps only the operation known to
/// be flaky; parse and shape errors inside still count as attempts, which is
/// acceptable because a malformed body one attempt may be an anti-bot
/// interstitial the next attempt gets past.
pub(crate) async fn with_retry<T, F, Fut>(monitor: &MonitorConfig, op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let strategy =
        FixedInterval::from_millis(monitor.retry_delay_ms).take(monitor.retry_attempts as usize);
    Retry::spawn(strategy, op).await
}

/// Marketplace APIs flip between string and numeric encodings for the same
/// field across versions; accept both.
pub(crate) fn value_as_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Sort cheapest first; equal prices tie-break on lower wear.
pub(crate) fn sort_by_price(records: &mut [PriceRecord]) {
    records.sort_by(|a, b| {
        a.price
            .partial_cmp(&b.price)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.wear.partial_cmp(&b.wear).unwrap_or(std::cmp::Ordering::Equal))
    });
}
