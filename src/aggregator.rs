use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::models::{ItemSpec, MonitoringRound};
use crate::monitors::MonitorRegistry;
use crate::scheduler::{interruptible_sleep, ShutdownToken};

/// Drives every configured adapter for one item and produces the round's
/// filtered, flagged result set.
pub struct Aggregator {
    registry: MonitorRegistry,
    monitor: MonitorConfig,
}

impl Aggregator {
    pub fn new(registry: MonitorRegistry, monitor: MonitorConfig) -> Self {
        Self { registry, monitor }
    }

    /// Gather one round for `item`. One platform's failure never aborts the
    /// round: an adapter error is logged and contributes zero records.
    ///
    /// The politeness delay between adapters is a shutdown checkpoint; once
    /// the token fires the remaining platforms are skipped and the partial
    /// round is returned.
    pub async fn run_round(&self, item: &ItemSpec, token: &ShutdownToken) -> MonitoringRound {
        let mut records = Vec::new();
        let mut fetched_any = false;

        for platform in &item.platforms {
            let Some(monitor) = self.registry.get(platform) else {
                warn!(platform = %platform, item = %item.name, "platform not enabled, skipping");
                continue;
            };

            // Courtesy delay so consecutive hosts aren't hit back to back.
            // Only owed once a request has actually been made.
            if fetched_any
                && self.monitor.platform_delay_secs > 0
                && !interruptible_sleep(self.monitor.platform_delay_secs, token).await
            {
                warn!(item = %item.name, "shutdown requested, skipping remaining platforms");
                break;
            }
            fetched_any = true;

            match monitor.fetch(item).await {
                Ok(batch) if batch.is_empty() => {
                    info!(platform = %platform, item = %item.name, "no matching listings");
                }
                Ok(batch) => {
                    info!(
                        platform = %platform,
                        item = %item.name,
                        listings = batch.len(),
                        "found matching listings"
                    );
                    records.extend(batch);
                }
                Err(e) => {
                    error!(
                        platform = %platform,
                        item = %item.name,
                        error = %e,
                        "platform fetch failed, contributing zero records"
                    );
                }
            }
        }

        crate::monitors::sort_by_price(&mut records);
        records.truncate(self.monitor.max_results);

        let alerts = item.alert_set(&records).into_iter().cloned().collect();
        MonitoringRound { records, alerts }
    }
}
