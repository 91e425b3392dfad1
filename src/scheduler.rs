use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::config::MonitorConfig;
use crate::models::{ItemSpec, MonitoringRound};
use crate::notify::NotifierSet;
use crate::storage::PriceStore;
use crate::summary;

/// Cooperative shutdown handle checked at loop checkpoints: between items,
/// during the politeness delay between platforms, and between interval-wait
/// ticks. Never threaded into an in-progress adapter call.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sleep `secs` in one-second slices, re-checking the token each slice so
/// shutdown latency stays around a second regardless of the interval.
/// Returns false if the wait was cut short.
pub async fn interruptible_sleep(secs: u64, token: &ShutdownToken) -> bool {
    for _ in 0..secs {
        if token.is_requested() {
            return false;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    !token.is_requested()
}

/// The long-running batch loop: every `monitor.interval` seconds, run one
/// round over all configured items in order.
pub struct MonitorLoop {
    aggregator: Aggregator,
    store: PriceStore,
    notifiers: NotifierSet,
    items: Vec<ItemSpec>,
    monitor: MonitorConfig,
    summary_dir: PathBuf,
}

impl MonitorLoop {
    pub fn new(
        aggregator: Aggregator,
        store: PriceStore,
        notifiers: NotifierSet,
        items: Vec<ItemSpec>,
        monitor: MonitorConfig,
        summary_dir: PathBuf,
    ) -> Self {
        Self {
            aggregator,
            store,
            notifiers,
            items,
            monitor,
            summary_dir,
        }
    }

    pub async fn run(&self, token: &ShutdownToken) {
        info!(
            items = self.items.len(),
            interval = self.monitor.interval,
            "monitor loop started"
        );

        loop {
            self.run_round(token).await;
            if token.is_requested() {
                break;
            }
            info!(interval = self.monitor.interval, "round complete, waiting");
            if !interruptible_sleep(self.monitor.interval, token).await {
                break;
            }
        }

        info!("monitor loop stopped");
    }

    /// One pass over all items. The token is checked between items and at
    /// the politeness delay inside an item; an in-flight adapter call is
    /// always allowed to complete.
    pub async fn run_round(&self, token: &ShutdownToken) {
        for item in &self.items {
            if token.is_requested() {
                break;
            }
            // Nothing past the aggregator boundary should fail the loop; a
            // defective item config just moves on to the next item.
            self.process_item(item, token).await;
        }
    }

    async fn process_item(&self, item: &ItemSpec, token: &ShutdownToken) {
        info!(item = %item.name, "monitoring item");
        let round = self.aggregator.run_round(item, token).await;
        if round.is_empty() {
            return;
        }
        self.persist_round(item, &round).await;
        self.alert_round(item, &round).await;
    }

    /// Persistence failures are logged and dropped; the next round is an
    /// independent attempt, there is no retry or rollback.
    async fn persist_round(&self, item: &ItemSpec, round: &MonitoringRound) {
        match self.store.append_batch(&round.records).await {
            Ok(()) => info!(item = %item.name, records = round.records.len(), "price records saved"),
            Err(e) => error!(item = %item.name, error = %e, "failed to persist price records"),
        }

        if let Err(e) = summary::write_round_summary(
            &round.records,
            &item.name,
            item.wear_min,
            item.wear_max,
            &self.summary_dir,
        ) {
            error!(item = %item.name, error = %e, "failed to write round summary");
        }
    }

    /// One alert per round per item, never per record.
    async fn alert_round(&self, item: &ItemSpec, round: &MonitoringRound) {
        if round.alerts.is_empty() {
            return;
        }
        let title = format!("[price alert] {}", item.name);
        let content = format!(
            "{} listing(s) at or below target ¥{:.2}",
            round.alerts.len(),
            item.target_price
        );
        info!(item = %item.name, alerts = round.alerts.len(), "sending price alert");
        self.notifiers.send(&title, &content, &round.alerts).await;
    }
}
