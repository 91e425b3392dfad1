use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::{MonitorConfig, PlatformConfig};
use crate::models::{ItemSpec, PriceRecord};
use crate::{AppError, Result};

use super::{build_client, sort_by_price, value_as_f64, with_retry, PlatformMonitor};

const PAGE_SIZE: u32 = 100;

/// Youpin (悠悠有品) adapter, driving the on-sale commodity list API behind
/// the market goods-list page.
pub struct YoupinMonitor {
    client: reqwest::Client,
    base_url: String,
    monitor: MonitorConfig,
}

impl YoupinMonitor {
    pub fn new(platform: &PlatformConfig, monitor: &MonitorConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(platform, monitor)?,
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            monitor: monitor.clone(),
        })
    }

    /// Template id from the item config, or parsed out of a pasted
    /// goods-list URL (`...goods-list?templateId=NNN`).
    fn template_id(item: &ItemSpec) -> Result<u64> {
        if let Some(id) = item.ids.youpin_template_id {
            return Ok(id);
        }
        if let Some(raw) = &item.ids.youpin_goods_list_url {
            let url = Url::parse(raw)
                .map_err(|e| AppError::Validation(format!("bad youpin_goods_list_url: {e}")))?;
            if let Some(id) = url
                .query_pairs()
                .find(|(k, _)| k == "templateId")
                .and_then(|(_, v)| v.parse().ok())
            {
                return Ok(id);
            }
        }
        // Config validation requires one of the two, so this only fires for
        // hand-built ItemSpecs.
        Err(AppError::Validation(
            "youpin item needs youpin_template_id or youpin_goods_list_url".into(),
        ))
    }

    async fn on_sale_page(&self, template_id: u64, page_index: u32) -> Result<Value> {
        let url = format!(
            "{}/api/homepage/pc/goods/market/queryOnSaleCommodityList",
            self.base_url
        );
        let body = json!({
            "templateId": template_id.to_string(),
            "pageIndex": page_index,
            "pageSize": PAGE_SIZE,
            "listType": 10,
            "listSortType": 1,
            "sortType": 1,
            "gameId": "730",
        });
        with_retry(&self.monitor, || async {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await?
                .error_for_status()?;
            Ok::<Value, AppError>(response.json().await?)
        })
        .await
    }

    /// The listing array has moved between `Data` and `data.commodityList`
    /// across front-end releases.
    fn commodity_list(payload: &Value) -> Result<&Vec<Value>> {
        payload["Data"]
            .as_array()
            .or_else(|| payload["data"]["commodityList"].as_array())
            .or_else(|| payload["data"].as_array())
            .ok_or_else(|| {
                AppError::ResponseShape("queryOnSaleCommodityList: no commodity array".into())
            })
    }
}

#[async_trait]
impl PlatformMonitor for YoupinMonitor {
    fn name(&self) -> &str {
        "youpin"
    }

    async fn fetch(&self, item: &ItemSpec) -> Result<Vec<PriceRecord>> {
        let template_id = Self::template_id(item)?;
        let listing_url = format!(
            "https://www.youpin898.com/market/goods-list?templateId={}",
            template_id
        );
        let mut records = Vec::new();

        for page_index in 1..=self.monitor.max_pages {
            let payload = self.on_sale_page(template_id, page_index).await?;
            let commodities = Self::commodity_list(&payload)?;
            if commodities.is_empty() {
                break;
            }
            debug!(template_id, page_index, listings = commodities.len(), "youpin on-sale page");

            for commodity in commodities {
                // Field spellings differ between API revisions.
                let Some(wear) = commodity
                    .get("abrade")
                    .or_else(|| commodity.get("Abrade"))
                    .and_then(value_as_f64)
                else {
                    continue;
                };
                let Some(price) = commodity
                    .get("price")
                    .or_else(|| commodity.get("Price"))
                    .and_then(value_as_f64)
                else {
                    continue;
                };
                if wear >= item.wear_min && wear <= item.wear_max {
                    records.push(PriceRecord::new(
                        "youpin",
                        &item.name,
                        price,
                        wear,
                        Some(listing_url.clone()),
                    ));
                }
            }

            if commodities.len() < PAGE_SIZE as usize {
                break;
            }
        }

        sort_by_price(&mut records);
        Ok(records)
    }
}
