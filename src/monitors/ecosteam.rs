use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{MonitorConfig, PlatformConfig};
use crate::models::{wear_from_percent, ItemSpec, PriceRecord};
use crate::{AppError, Result};

use super::{build_client, sort_by_price, value_as_f64, with_retry, PlatformMonitor};

const PAGE_SIZE: u32 = 50;

/// ECOSteam adapter. The goods page HTML yields the item's HashName, the
/// detail API maps that to an internal goods id, and the sell-list API
/// returns listings. When the sell-list API misbehaves the sell table is
/// scraped out of the goods page markup instead.
pub struct EcosteamMonitor {
    client: reqwest::Client,
    base_url: String,
    monitor: MonitorConfig,
    hash_name_re: Regex,
    sell_row_re: Regex,
}

impl EcosteamMonitor {
    pub fn new(platform: &PlatformConfig, monitor: &MonitorConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(platform, monitor)?,
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            monitor: monitor.clone(),
            hash_name_re: Regex::new(r#"HashName["']?\s*[:=]\s*["']?([^"'&<\s]+)"#)
                .map_err(|e| AppError::Internal(format!("bad hash name regex: {e}")))?,
            // Wear label followed (within the same listing row) by a CNY price.
            sell_row_re: Regex::new(
                r"磨损度?[：:]\s*([0-9]+\.[0-9]+)[\s\S]{0,400}?[￥¥]\s*([0-9]+(?:\.[0-9]+)?)",
            )
            .map_err(|e| AppError::Internal(format!("bad sell row regex: {e}")))?,
        })
    }

    async fn goods_page_html(&self, goods_url: &str) -> Result<String> {
        with_retry(&self.monitor, || async {
            let response = self
                .client
                .get(goods_url)
                .send()
                .await?
                .error_for_status()?;
            Ok::<String, AppError>(response.text().await?)
        })
        .await
    }

    fn extract_hash_name(&self, html: &str) -> Option<String> {
        self.hash_name_re
            .captures(html)
            .map(|caps| caps[1].to_string())
    }

    async fn post_api(&self, path: &str, body: &Value, referer: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        with_retry(&self.monitor, || async {
            let response = self
                .client
                .post(&url)
                .header("Accept", "application/json, text/plain, */*")
                .header("Origin", &self.base_url)
                .header("Referer", referer)
                .json(body)
                .send()
                .await?
                .error_for_status()?;
            Ok::<Value, AppError>(response.json().await?)
        })
        .await
    }

    async fn resolve_internal_goods_id(&self, hash_name: &str, referer: &str) -> Result<String> {
        let payload = self
            .post_api(
                "/Api/SteamGoods/GoodsDetailQueryPost",
                &json!({"GameId": 730, "HashName": hash_name}),
                referer,
            )
            .await?;
        let id = payload["ResultData"]
            .get("Id")
            .or_else(|| payload["ResultData"].get("GoodsId"))
            .ok_or_else(|| {
                AppError::ResponseShape("GoodsDetailQueryPost: missing ResultData id".into())
            })?;
        Ok(match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    async fn sell_list_via_api(&self, item: &ItemSpec, goods_url: &str) -> Result<Vec<PriceRecord>> {
        let hash_name = self
            .extract_hash_name(&self.goods_page_html(goods_url).await?)
            .ok_or_else(|| {
                AppError::ResponseShape("goods page did not contain a HashName".into())
            })?;
        debug!(hash_name = %hash_name, "ecosteam hash name resolved");
        let goods_id = self.resolve_internal_goods_id(&hash_name, goods_url).await?;

        let mut records = Vec::new();
        for page_index in 1..=self.monitor.max_pages {
            let payload = self
                .post_api(
                    "/Api/SteamGoods/SellGoodsQuery",
                    &json!({
                        "GoodsId": goods_id,
                        "PageIndex": page_index,
                        "PageSize": PAGE_SIZE,
                        "SortType": "1",
                    }),
                    goods_url,
                )
                .await?;
            let rows = payload["ResultData"]["PageResult"]
                .as_array()
                .or_else(|| payload["ResultData"].as_array())
                .ok_or_else(|| {
                    AppError::ResponseShape("SellGoodsQuery: missing ResultData.PageResult".into())
                })?;
            if rows.is_empty() {
                break;
            }

            for row in rows {
                // Scale is a wear percentage, always divided down; no
                // value-based guessing about the unit.
                let Some(scale) = row.get("Scale").and_then(value_as_f64) else {
                    continue;
                };
                let wear = wear_from_percent(scale);
                let Some(price) = row.get("SellingPrice").and_then(value_as_f64) else {
                    continue;
                };
                if wear >= item.wear_min && wear <= item.wear_max {
                    records.push(PriceRecord::new(
                        "ecosteam",
                        &item.name,
                        price,
                        wear,
                        Some(goods_url.to_string()),
                    ));
                }
            }

            if rows.len() < PAGE_SIZE as usize {
                break;
            }
        }
        Ok(records)
    }

    /// Last-resort scrape of the sell table embedded in the goods page.
    /// Wear values in the markup are fractions, not percentages.
    fn sell_list_from_html(&self, html: &str, item: &ItemSpec, goods_url: &str) -> Vec<PriceRecord> {
        self.sell_row_re
            .captures_iter(html)
            .take(300)
            .filter_map(|caps| {
                let wear: f64 = caps[1].parse().ok()?;
                let price: f64 = caps[2].parse().ok()?;
                (wear >= item.wear_min && wear <= item.wear_max).then(|| {
                    PriceRecord::new("ecosteam", &item.name, price, wear, Some(goods_url.to_string()))
                })
            })
            .collect()
    }
}

#[async_trait]
impl PlatformMonitor for EcosteamMonitor {
    fn name(&self) -> &str {
        "ecosteam"
    }

    async fn fetch(&self, item: &ItemSpec) -> Result<Vec<PriceRecord>> {
        let goods_url = item.ids.ecosteam_goods_url.as_deref().ok_or_else(|| {
            AppError::Validation("ecosteam item needs ecosteam_goods_url".into())
        })?;

        let mut records = match self.sell_list_via_api(item, goods_url).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "ecosteam sell-list API failed, falling back to HTML scrape");
                let html = self.goods_page_html(goods_url).await?;
                self.sell_list_from_html(&html, item, goods_url)
            }
        };

        sort_by_price(&mut records);
        Ok(records)
    }
}
