use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Local;
use serde::Serialize;
use tracing::debug;

use crate::models::PriceRecord;
use crate::Result;

/// Human/machine-readable artifact of one round, grouped by platform. A side
/// artifact only; nothing reads it back for decisions.
#[derive(Debug, Serialize)]
pub struct RoundSummary {
    pub item_name: String,
    pub wear_range: WearRange,
    pub timestamp: String,
    pub summary: BTreeMap<String, PlatformSummary>,
    pub details: BTreeMap<String, Vec<PriceRecord>>,
}

#[derive(Debug, Serialize)]
pub struct WearRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Serialize)]
pub struct PlatformSummary {
    pub count: usize,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub fn build_summary(
    records: &[PriceRecord],
    item_name: &str,
    wear_min: f64,
    wear_max: f64,
) -> RoundSummary {
    let mut details: BTreeMap<String, Vec<PriceRecord>> = BTreeMap::new();
    for record in records {
        details
            .entry(record.platform.clone())
            .or_default()
            .push(record.clone());
    }
    for rows in details.values_mut() {
        rows.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.wear.partial_cmp(&b.wear).unwrap_or(std::cmp::Ordering::Equal))
        });
    }

    let summary = details
        .iter()
        .map(|(platform, rows)| {
            let prices = rows.iter().map(|r| r.price);
            (
                platform.clone(),
                PlatformSummary {
                    count: rows.len(),
                    min_price: prices.clone().fold(None, |acc: Option<f64>, p| {
                        Some(acc.map_or(p, |m| m.min(p)))
                    }),
                    max_price: prices.fold(None, |acc: Option<f64>, p| {
                        Some(acc.map_or(p, |m| m.max(p)))
                    }),
                },
            )
        })
        .collect();

    RoundSummary {
        item_name: item_name.to_string(),
        wear_range: WearRange {
            min: wear_min,
            max: wear_max,
        },
        timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        summary,
        details,
    }
}

/// Write `latest_monitoring_result.json` plus a timestamped backup copy.
/// Nothing is written for an empty round.
pub fn write_round_summary(
    records: &[PriceRecord],
    item_name: &str,
    wear_min: f64,
    wear_max: f64,
    dir: &Path,
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let summary = build_summary(records, item_name, wear_min, wear_max);
    let json = serde_json::to_string_pretty(&summary)?;

    fs::create_dir_all(dir)?;
    let latest = dir.join("latest_monitoring_result.json");
    fs::write(&latest, &json)?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let backup = dir.join(format!("monitoring_result_{stamp}.json"));
    fs::write(&backup, &json)?;

    debug!(path = %latest.display(), "round summary written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(platform: &str, price: f64, wear: f64) -> PriceRecord {
        PriceRecord::new(platform, "X", price, wear, None)
    }

    #[test]
    fn test_build_summary_groups_and_sorts() {
        let records = vec![
            record("buff", 150.0, 0.3),
            record("buff", 90.0, 0.2),
            record("youpin", 120.0, 0.25),
        ];
        let summary = build_summary(&records, "X", 0.15, 0.38);

        assert_eq!(summary.details["buff"].len(), 2);
        assert_eq!(summary.details["buff"][0].price, 90.0);
        assert_eq!(summary.summary["buff"].count, 2);
        assert_eq!(summary.summary["buff"].min_price, Some(90.0));
        assert_eq!(summary.summary["buff"].max_price, Some(150.0));
        assert_eq!(summary.summary["youpin"].count, 1);
        assert_eq!(summary.wear_range.min, 0.15);
    }

    #[test]
    fn test_write_creates_latest_and_backup() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("buff", 90.0, 0.2)];
        write_round_summary(&records, "X", 0.15, 0.38, dir.path()).unwrap();

        let latest = dir.path().join("latest_monitoring_result.json");
        assert!(latest.exists());

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 2);

        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(latest).unwrap()).unwrap();
        assert_eq!(parsed["item_name"], "X");
        assert_eq!(parsed["summary"]["buff"]["count"], 1);
    }

    #[test]
    fn test_empty_round_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        write_round_summary(&[], "X", 0.15, 0.38, dir.path()).unwrap();
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
