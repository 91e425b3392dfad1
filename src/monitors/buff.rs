use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{MonitorConfig, PlatformConfig};
use crate::models::{ItemSpec, PriceRecord};
use crate::{AppError, Result};

use super::{build_client, sort_by_price, value_as_f64, with_retry, PlatformMonitor};

const PAGE_SIZE: u32 = 50;

/// BUFF market adapter. Resolves a goods id (configured, or via the search
/// API) and scans the sell-order listing pages, cheapest first.
pub struct BuffMonitor {
    client: reqwest::Client,
    base_url: String,
    monitor: MonitorConfig,
}

impl BuffMonitor {
    pub fn new(platform: &PlatformConfig, monitor: &MonitorConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(platform, monitor)?,
            base_url: platform.base_url.trim_end_matches('/').to_string(),
            monitor: monitor.clone(),
        })
    }

    /// The search endpoint is heavily rate limited; a configured goods id
    /// skips it entirely.
    async fn resolve_goods_id(&self, item_name: &str) -> Result<String> {
        let url = format!("{}/api/market/search", self.base_url);
        let payload = with_retry(&self.monitor, || async {
            let response = self
                .client
                .get(&url)
                .query(&[("game", "csgo"), ("page_num", "1"), ("search", item_name)])
                .send()
                .await?
                .error_for_status()?;
            Ok::<Value, AppError>(response.json().await?)
        })
        .await?;

        if payload["code"] != "OK" {
            return Err(AppError::platform(
                "buff",
                format!("search returned code={}", payload["code"]),
            ));
        }
        let id = payload["data"]["items"]
            .as_array()
            .and_then(|items| items.first())
            .and_then(|item| item.get("id"))
            .ok_or_else(|| AppError::ResponseShape("search: missing data.items[0].id".into()))?;
        Ok(match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    async fn sell_order_page(&self, goods_id: &str, page_num: u32) -> Result<Value> {
        let url = format!("{}/api/market/goods/sell_order", self.base_url);
        let page = page_num.to_string();
        let size = PAGE_SIZE.to_string();
        let payload = with_retry(&self.monitor, || async {
            let response = self
                .client
                .get(&url)
                .query(&[
                    ("game", "csgo"),
                    ("goods_id", goods_id),
                    ("page_num", page.as_str()),
                    ("page_size", size.as_str()),
                    ("sort_by", "price.asc"),
                ])
                .send()
                .await?
                .error_for_status()?;
            Ok::<Value, AppError>(response.json().await?)
        })
        .await?;

        if payload["code"] != "OK" {
            return Err(AppError::platform(
                "buff",
                format!("sell_order returned code={}", payload["code"]),
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl PlatformMonitor for BuffMonitor {
    fn name(&self) -> &str {
        "buff"
    }

    async fn fetch(&self, item: &ItemSpec) -> Result<Vec<PriceRecord>> {
        let goods_id = match &item.ids.buff_goods_id {
            Some(id) => id.clone(),
            None => {
                let id = self.resolve_goods_id(&item.name).await?;
                info!(item = %item.name, goods_id = %id, "resolved buff goods id via search");
                id
            }
        };

        let listing_url = format!("{}/goods/{}", self.base_url, goods_id);
        let mut records = Vec::new();

        for page_num in 1..=self.monitor.max_pages {
            let payload = self.sell_order_page(&goods_id, page_num).await?;
            let items = payload["data"]["items"]
                .as_array()
                .ok_or_else(|| AppError::ResponseShape("sell_order: missing data.items".into()))?;
            if items.is_empty() {
                break;
            }
            debug!(goods_id = %goods_id, page_num, listings = items.len(), "buff sell_order page");

            for listing in items {
                // paintwear is a stringified float on assets that have one;
                // stickers/cases simply lack the field.
                let Some(wear) = listing["asset_info"]
                    .get("paintwear")
                    .and_then(value_as_f64)
                else {
                    continue;
                };
                let Some(price) = listing.get("price").and_then(value_as_f64) else {
                    continue;
                };
                if wear >= item.wear_min && wear <= item.wear_max {
                    records.push(PriceRecord::new(
                        "buff",
                        &item.name,
                        price,
                        wear,
                        Some(listing_url.clone()),
                    ));
                }
            }

            // A short page is the last one; don't pay for an empty follow-up.
            if items.len() < PAGE_SIZE as usize {
                break;
            }
        }

        sort_by_price(&mut records);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlatformIds;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_item(goods_id: Option<&str>) -> ItemSpec {
        ItemSpec {
            name: "AK-47 | Redline (Field-Tested)".to_string(),
            wear_min: 0.15,
            wear_max: 0.38,
            target_price: 120.0,
            platforms: vec!["buff".to_string()],
            ids: PlatformIds {
                buff_goods_id: goods_id.map(|s| s.to_string()),
                ..Default::default()
            },
        }
    }

    async fn monitor_for(server: &MockServer) -> BuffMonitor {
        let platform = PlatformConfig {
            enabled: true,
            base_url: server.uri(),
            headers: Default::default(),
            cookie: None,
        };
        let monitor = MonitorConfig {
            max_pages: 2,
            retry_attempts: 0,
            retry_delay_ms: 1,
            ..Default::default()
        };
        BuffMonitor::new(&platform, &monitor).unwrap()
    }

    fn sell_order_body(items: Vec<Value>) -> Value {
        json!({"code": "OK", "data": {"items": items}})
    }

    #[tokio::test]
    async fn test_fetch_filters_by_wear_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/market/goods/sell_order"))
            .and(query_param("page_num", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sell_order_body(vec![
                json!({"price": "118.5", "asset_info": {"paintwear": "0.2134"}}),
                json!({"price": "95.0", "asset_info": {"paintwear": "0.4501"}}),
                json!({"price": "130.0", "asset_info": {}}),
            ])))
            .mount(&server)
            .await;

        let monitor = monitor_for(&server).await;
        let records = monitor.fetch(&test_item(Some("33885"))).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price, 118.5);
        assert_eq!(records[0].wear, 0.2134);
        assert_eq!(records[0].platform, "buff");
        assert!(records[0].url.as_deref().unwrap().ends_with("/goods/33885"));
    }

    #[tokio::test]
    async fn test_fetch_resolves_goods_id_when_not_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/market/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "OK",
                "data": {"items": [{"id": 33885, "name": "AK-47 | Redline"}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/market/goods/sell_order"))
            .and(query_param("goods_id", "33885"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sell_order_body(vec![])))
            .mount(&server)
            .await;

        let monitor = monitor_for(&server).await;
        let records = monitor.fetch(&test_item(None)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_short_page_stops_pagination() {
        // Fewer listings than the page size means the last page; a second
        // request would only come back empty. Only page 1 is mounted, so a
        // stray page-2 request would fail the fetch.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/market/goods/sell_order"))
            .and(query_param("page_num", "1"))
            .and(query_param("page_size", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sell_order_body(vec![
                json!({"price": "118.5", "asset_info": {"paintwear": "0.2134"}}),
                json!({"price": "120.0", "asset_info": {"paintwear": "0.2500"}}),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let monitor = monitor_for(&server).await;
        let records = monitor.fetch(&test_item(Some("33885"))).await.unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn test_anti_bot_code_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/market/goods/sell_order"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": "Login Required", "error": "login required"})),
            )
            .mount(&server)
            .await;

        let monitor = monitor_for(&server).await;
        let result = monitor.fetch(&test_item(Some("33885"))).await;
        assert!(matches!(result, Err(AppError::Platform { .. })));
    }

    #[tokio::test]
    async fn test_results_sorted_by_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/market/goods/sell_order"))
            .and(query_param("page_num", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sell_order_body(vec![
                json!({"price": "130.0", "asset_info": {"paintwear": "0.30"}}),
                json!({"price": "110.0", "asset_info": {"paintwear": "0.20"}}),
            ])))
            .mount(&server)
            .await;

        let monitor = monitor_for(&server).await;
        let records = monitor.fetch(&test_item(Some("33885"))).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].price < records[1].price);
    }
}
