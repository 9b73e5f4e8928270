// src/prices.rs
use crate::error::SyncError;
use crate::models::PriceQuote;
use async_trait::async_trait;
use log::info;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

/// Bulk market-data lookup. One call per sync run; ids absent from the
/// returned map are treated as fetch failures by the reconciler.
#[async_trait]
pub trait PriceService: Send + Sync {
    async fn get_prices(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>, SyncError>;
}

#[derive(Debug, Deserialize)]
struct CoinGeckoQuote {
    usd: f64,
    usd_24h_change: Option<f64>,
}

/// Client for the CoinGecko simple-price endpoint. No authentication is
/// required; a demo API key header is attached when configured.
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinGeckoClient {
    pub fn new(client: Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl PriceService for CoinGeckoClient {
    async fn get_prices(&self, ids: &[String]) -> Result<HashMap<String, PriceQuote>, SyncError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/api/v3/simple/price", self.base_url);
        let mut request = self.client.get(&url).query(&[
            ("ids", ids.join(",")),
            ("vs_currencies", "usd".to_string()),
            ("include_24hr_change", "true".to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await.map_err(|e| SyncError::ExternalService {
            status: 0,
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::ExternalService {
                status: status.as_u16(),
                reason: format!("price request failed: HTTP {}", status),
            });
        }

        // Parse against a fixed schema; anything else is a service error,
        // not a per-holding one.
        let quotes = response
            .json::<HashMap<String, CoinGeckoQuote>>()
            .await
            .map_err(|e| SyncError::ExternalService {
                status: status.as_u16(),
                reason: format!("malformed price payload: {}", e),
            })?;

        info!("Fetched quotes for {}/{} ids", quotes.len(), ids.len());
        Ok(quotes
            .into_iter()
            .map(|(id, q)| {
                (
                    id,
                    PriceQuote {
                        price: q.usd,
                        change_24h: q.usd_24h_change.unwrap_or(0.0),
                    },
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn bulk_fetch_parses_prices_and_changes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(query_param("ids", "bitcoin,ethereum"))
            .and(query_param("vs_currencies", "usd"))
            .and(query_param("include_24hr_change", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "bitcoin": { "usd": 50000.0, "usd_24h_change": 2.1 },
                "ethereum": { "usd": 3000.0 }
            })))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(Client::new(), &server.uri(), None);
        let quotes = client
            .get_prices(&ids(&["bitcoin", "ethereum"]))
            .await
            .unwrap();

        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes["bitcoin"].price, 50000.0);
        assert_eq!(quotes["bitcoin"].change_24h, 2.1);
        // Missing 24h change defaults to zero rather than failing the batch.
        assert_eq!(quotes["ethereum"].change_24h, 0.0);
    }

    #[tokio::test]
    async fn demo_api_key_is_sent_as_header_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .and(header("x-cg-demo-api-key", "demo-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            CoinGeckoClient::new(Client::new(), &server.uri(), Some("demo-123".to_string()));
        client.get_prices(&ids(&["bitcoin"])).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(Client::new(), &server.uri(), None);
        let err = client.get_prices(&ids(&["bitcoin"])).await.unwrap_err();
        assert!(matches!(err, SyncError::ExternalService { status: 429, .. }));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_external_service_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/simple/price"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "bitcoin": "not-an-object" })),
            )
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(Client::new(), &server.uri(), None);
        let err = client.get_prices(&ids(&["bitcoin"])).await.unwrap_err();
        assert!(matches!(err, SyncError::ExternalService { status: 200, .. }));
    }

    #[tokio::test]
    async fn empty_id_set_never_touches_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let client = CoinGeckoClient::new(Client::new(), &server.uri(), None);
        let quotes = client.get_prices(&[]).await.unwrap();
        assert!(quotes.is_empty());
    }
}
