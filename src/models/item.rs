use serde::{Deserialize, Serialize};

use super::PriceRecord;

/// One item to monitor. Built from configuration at process start and
/// immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemSpec {
    pub name: String,
    pub wear_min: f64,
    pub wear_max: f64,
    pub target_price: f64,
    /// Platform identifiers to query, in configured order.
    pub platforms: Vec<String>,
    #[serde(default)]
    pub ids: PlatformIds,
}

/// Per-platform listing identifiers. Typed fields instead of an opaque blob,
/// so presence can be checked once at config load.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlatformIds {
    /// BUFF internal goods id. Optional; the adapter falls back to the search
    /// API, which is more likely to be rate-limited.
    #[serde(default)]
    pub buff_goods_id: Option<String>,
    /// Youpin market template id.
    #[serde(default)]
    pub youpin_template_id: Option<u64>,
    /// Alternative to the template id: a goods-list URL whose query string
    /// carries `templateId`.
    #[serde(default)]
    pub youpin_goods_list_url: Option<String>,
    /// ECOSteam goods detail page URL, used to locate the item's HashName.
    #[serde(default)]
    pub ecosteam_goods_url: Option<String>,
}

impl ItemSpec {
    /// Partition `records` into the alert set: everything at or below the
    /// target price.
    pub fn alert_set<'a>(&self, records: &'a [PriceRecord]) -> Vec<&'a PriceRecord> {
        records
            .iter()
            .filter(|r| r.price <= self.target_price)
            .collect()
    }
}

/// Ephemeral per-item aggregate of one scheduler iteration. Consumed by the
/// persistence sink and notifier, then discarded.
#[derive(Debug, Clone, Default)]
pub struct MonitoringRound {
    pub records: Vec<PriceRecord>,
    pub alerts: Vec<PriceRecord>,
}

impl MonitoringRound {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
