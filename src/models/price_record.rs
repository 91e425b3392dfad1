use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One observed marketplace listing. Immutable after creation; persisted
/// once, never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct PriceRecord {
    /// Identifier of the adapter that produced the record ("buff", "youpin", ...).
    pub platform: String,
    /// Canonical item identity as configured, not the marketplace's raw label.
    pub item_name: String,
    /// Listing price in the platform's native currency unit.
    pub price: f64,
    /// Normalized wear in [0, 1].
    pub wear: f64,
    /// Listing or parent product page, best effort.
    pub url: Option<String>,
    /// Epoch seconds at observation time.
    pub timestamp: i64,
}

impl PriceRecord {
    pub fn new(
        platform: impl Into<String>,
        item_name: impl Into<String>,
        price: f64,
        wear: f64,
        url: Option<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            item_name: item_name.into(),
            price,
            wear,
            url,
            timestamp: super::epoch_now(),
        }
    }

    pub fn in_wear_range(&self, wear_min: f64, wear_max: f64) -> bool {
        self.wear >= wear_min && self.wear <= wear_max
    }
}

/// Normalize a wear value reported as a percentage (e.g. ECOSteam `Scale`)
/// into the canonical [0, 1] fraction.
///
/// Only called for source fields documented to carry percentages. Fields that
/// report fractions are taken as-is even when out of range, so a corrupt
/// fraction is never silently reinterpreted as a percentage.
pub fn wear_from_percent(value: f64) -> f64 {
    value / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_record_creation() {
        let record = PriceRecord::new("buff", "AK-47 | Redline", 152.5, 0.21, None);
        assert_eq!(record.platform, "buff");
        assert_eq!(record.item_name, "AK-47 | Redline");
        assert!(record.url.is_none());
        assert!(record.timestamp > 0);
    }

    #[rstest]
    #[case(0.2, true)]
    #[case(0.1999999, false)]
    #[case(0.2000001, false)]
    fn test_degenerate_single_point_range(#[case] wear: f64, #[case] expected: bool) {
        let record = PriceRecord::new("buff", "X", 10.0, wear, None);
        assert_eq!(record.in_wear_range(0.2, 0.2), expected);
    }

    #[test]
    fn test_range_is_inclusive_on_both_ends() {
        let record = PriceRecord::new("youpin", "X", 10.0, 0.15, None);
        assert!(record.in_wear_range(0.15, 0.38));
        let record = PriceRecord::new("youpin", "X", 10.0, 0.38, None);
        assert!(record.in_wear_range(0.15, 0.38));
    }

    #[test]
    fn test_wear_from_percent() {
        assert_eq!(wear_from_percent(21.5), 0.215);
        assert_eq!(wear_from_percent(0.0), 0.0);
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let record = PriceRecord::new(
            "ecosteam",
            "AWP | Asiimov",
            980.0,
            0.31,
            Some("https://www.ecosteam.cn/goods/1".to_string()),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: PriceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
