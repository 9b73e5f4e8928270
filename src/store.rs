// src/store.rs
use crate::models::{Holding, HoldingPatch};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Columns A..F of a portfolio tab:
/// symbol, external_id, quantity, current_price, price_change_24h, last_price_update
const DATA_RANGE: &str = "A2:F";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("spreadsheet API error: HTTP {0}")]
    Api(u16),
    #[error("symbol not found: {0}")]
    NotFound(String),
}

/// System of record for portfolio holdings. The production implementation
/// is a Google Sheets document; tests substitute an in-memory fake.
#[async_trait]
pub trait HoldingStore: Send + Sync {
    /// Current ordered holdings of one portfolio tab.
    async fn list_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, StoreError>;

    /// Write a fresh price and 24h change for one holding, stamping
    /// last_price_update.
    async fn update_holding_price(
        &self,
        portfolio_id: &str,
        symbol: &str,
        price: f64,
        change_24h: f64,
    ) -> Result<(), StoreError>;

    async fn add_holding(&self, portfolio_id: &str, holding: &Holding) -> Result<(), StoreError>;

    async fn edit_holding(
        &self,
        portfolio_id: &str,
        symbol: &str,
        patch: &HoldingPatch,
    ) -> Result<(), StoreError>;

    async fn delete_holding(&self, portfolio_id: &str, symbol: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Holdings store backed by the Google Sheets values API. One tab per
/// portfolio, one row per holding.
pub struct SheetsStore {
    client: Client,
    base_url: String,
    spreadsheet_id: String,
    api_key: Option<String>,
}

impl SheetsStore {
    pub fn new(
        client: Client,
        base_url: &str,
        spreadsheet_id: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            api_key,
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, range
        )
    }

    fn key_params(&self) -> Vec<(&'static str, String)> {
        match &self.api_key {
            Some(key) => vec![("key", key.clone())],
            None => Vec::new(),
        }
    }

    async fn read_range(&self, range: &str) -> Result<ValueRange, StoreError> {
        let response = self
            .client
            .get(self.values_url(range))
            .query(&self.key_params())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Api(response.status().as_u16()));
        }
        Ok(response.json::<ValueRange>().await?)
    }

    async fn write_range(
        &self,
        range: &str,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<(), StoreError> {
        let mut params = self.key_params();
        params.push(("valueInputOption", "RAW".to_string()));
        let response = self
            .client
            .put(self.values_url(range))
            .query(&params)
            .json(&json!({ "range": range, "values": rows }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Api(response.status().as_u16()));
        }
        Ok(())
    }

    /// Sheet row number of a symbol (1-based, header on row 1).
    async fn find_row(&self, portfolio_id: &str, symbol: &str) -> Result<usize, StoreError> {
        let range = format!("{}!{}", portfolio_id, DATA_RANGE);
        let values = self.read_range(&range).await?.values;
        for (offset, row) in values.iter().enumerate() {
            if cell(row, 0).map(|s| s.eq_ignore_ascii_case(symbol)) == Some(true) {
                return Ok(offset + 2);
            }
        }
        Err(StoreError::NotFound(symbol.to_string()))
    }
}

fn cell(row: &[serde_json::Value], index: usize) -> Option<String> {
    row.get(index)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_holding(row: &[serde_json::Value]) -> Option<Holding> {
    let symbol = cell(row, 0)?;
    Some(Holding {
        symbol,
        external_id: cell(row, 1),
        quantity: cell(row, 2).and_then(|s| s.parse().ok()).unwrap_or(0.0),
        current_price: cell(row, 3).and_then(|s| s.parse().ok()).unwrap_or(0.0),
        price_change_24h: cell(row, 4).and_then(|s| s.parse().ok()).unwrap_or(0.0),
        last_price_update: cell(row, 5)
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
    })
}

fn holding_row(holding: &Holding) -> Vec<serde_json::Value> {
    vec![
        json!(holding.symbol),
        json!(holding.external_id.clone().unwrap_or_default()),
        json!(holding.quantity.to_string()),
        json!(holding.current_price.to_string()),
        json!(holding.price_change_24h.to_string()),
        json!(holding
            .last_price_update
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()),
    ]
}

#[async_trait]
impl HoldingStore for SheetsStore {
    async fn list_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, StoreError> {
        let range = format!("{}!{}", portfolio_id, DATA_RANGE);
        let values = self.read_range(&range).await?.values;
        // Cleared rows come back empty; skip them without renumbering.
        let holdings: Vec<Holding> = values.iter().filter_map(|r| parse_holding(r)).collect();
        info!(
            "Fetched {} holdings for portfolio: {}",
            holdings.len(),
            portfolio_id
        );
        Ok(holdings)
    }

    async fn update_holding_price(
        &self,
        portfolio_id: &str,
        symbol: &str,
        price: f64,
        change_24h: f64,
    ) -> Result<(), StoreError> {
        let row = self.find_row(portfolio_id, symbol).await?;
        let range = format!("{}!D{}:F{}", portfolio_id, row, row);
        self.write_range(
            &range,
            vec![vec![
                json!(price.to_string()),
                json!(change_24h.to_string()),
                json!(Utc::now().to_rfc3339()),
            ]],
        )
        .await?;
        info!(
            "Stored price for {}: {} ({:+.2}% 24h)",
            symbol, price, change_24h
        );
        Ok(())
    }

    async fn add_holding(&self, portfolio_id: &str, holding: &Holding) -> Result<(), StoreError> {
        let range = format!("{}!{}", portfolio_id, DATA_RANGE);
        let mut params = self.key_params();
        params.push(("valueInputOption", "RAW".to_string()));
        let response = self
            .client
            .post(format!("{}:append", self.values_url(&range)))
            .query(&params)
            .json(&json!({ "values": [holding_row(holding)] }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Api(response.status().as_u16()));
        }
        Ok(())
    }

    async fn edit_holding(
        &self,
        portfolio_id: &str,
        symbol: &str,
        patch: &HoldingPatch,
    ) -> Result<(), StoreError> {
        let row = self.find_row(portfolio_id, symbol).await?;
        let current = self
            .list_holdings(portfolio_id)
            .await?
            .into_iter()
            .find(|h| h.symbol.eq_ignore_ascii_case(symbol))
            .ok_or_else(|| StoreError::NotFound(symbol.to_string()))?;
        // Absent keeps the stored id, explicit null clears it.
        let external_id = match patch.external_id.clone() {
            Some(value) => value,
            None => current.external_id,
        };
        let quantity = patch.quantity.unwrap_or(current.quantity);
        let range = format!("{}!B{}:C{}", portfolio_id, row, row);
        self.write_range(
            &range,
            vec![vec![
                json!(external_id.unwrap_or_default()),
                json!(quantity.to_string()),
            ]],
        )
        .await
    }

    async fn delete_holding(&self, portfolio_id: &str, symbol: &str) -> Result<(), StoreError> {
        let row = self.find_row(portfolio_id, symbol).await?;
        let range = format!("{}!A{}:F{}", portfolio_id, row, row);
        let response = self
            .client
            .post(format!("{}:clear", self.values_url(&range)))
            .query(&self.key_params())
            .json(&json!({}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(StoreError::Api(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> SheetsStore {
        SheetsStore::new(Client::new(), &server.uri(), "sheet-1", None)
    }

    async fn mount_list(server: &MockServer, rows: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!A2:F"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Main!A2:F",
                "values": rows
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn list_holdings_parses_rows_and_skips_cleared_ones() {
        let server = MockServer::start().await;
        mount_list(
            &server,
            json!([
                ["BTC", "bitcoin", "0.5", "50000", "2.1", "2024-05-01T12:00:00+00:00"],
                [],
                ["CASH", "", "1000", "1", "", ""]
            ]),
        )
        .await;

        let holdings = store(&server).list_holdings("Main").await.unwrap();

        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].symbol, "BTC");
        assert_eq!(holdings[0].external_id.as_deref(), Some("bitcoin"));
        assert_eq!(holdings[0].quantity, 0.5);
        assert_eq!(holdings[0].current_price, 50000.0);
        assert!(holdings[0].last_price_update.is_some());
        assert_eq!(holdings[1].symbol, "CASH");
        assert_eq!(holdings[1].external_id, None);
        assert_eq!(holdings[1].price_change_24h, 0.0);
        assert!(holdings[1].last_price_update.is_none());
    }

    #[tokio::test]
    async fn list_failure_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = store(&server).list_holdings("Main").await.unwrap_err();
        assert!(matches!(err, StoreError::Api(503)));
    }

    #[tokio::test]
    async fn price_update_writes_the_matching_row() {
        let server = MockServer::start().await;
        mount_list(
            &server,
            json!([
                ["BTC", "bitcoin", "0.5", "40000", "0", ""],
                ["ETH", "ethereum", "2", "3000", "0", ""]
            ]),
        )
        .await;
        // ETH sits on sheet row 3 (header + BTC above it).
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!D3:F3"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_partial_json(json!({
                "range": "Main!D3:F3",
                "values": [["3100", "-1.5"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .update_holding_price("Main", "ETH", 3100.0, -1.5)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn price_update_for_unknown_symbol_is_not_found() {
        let server = MockServer::start().await;
        mount_list(&server, json!([["BTC", "bitcoin", "1", "1", "0", ""]])).await;

        let err = store(&server)
            .update_holding_price("Main", "DOGE", 0.1, 0.0)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn add_holding_appends_a_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!A2:F:append"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_partial_json(json!({
                "values": [["SOL", "solana", "10"]]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let holding = Holding {
            symbol: "SOL".to_string(),
            external_id: Some("solana".to_string()),
            quantity: 10.0,
            current_price: 0.0,
            price_change_24h: 0.0,
            last_price_update: None,
        };
        store(&server).add_holding("Main", &holding).await.unwrap();
    }

    #[tokio::test]
    async fn edit_with_explicit_null_clears_the_external_id() {
        let server = MockServer::start().await;
        mount_list(&server, json!([["BTC", "bitcoin", "1", "1", "0", ""]])).await;
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!B2:C2"))
            .and(body_partial_json(json!({ "values": [["", "2"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let patch: HoldingPatch =
            serde_json::from_str(r#"{"external_id": null, "quantity": 2.0}"#).unwrap();
        store(&server).edit_holding("Main", "BTC", &patch).await.unwrap();
    }

    #[tokio::test]
    async fn edit_without_external_id_field_keeps_the_stored_one() {
        let server = MockServer::start().await;
        mount_list(&server, json!([["BTC", "bitcoin", "1", "1", "0", ""]])).await;
        Mock::given(method("PUT"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!B2:C2"))
            .and(body_partial_json(json!({ "values": [["bitcoin", "3"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let patch: HoldingPatch = serde_json::from_str(r#"{"quantity": 3.0}"#).unwrap();
        store(&server).edit_holding("Main", "BTC", &patch).await.unwrap();
    }

    #[tokio::test]
    async fn delete_clears_the_matching_row() {
        let server = MockServer::start().await;
        mount_list(&server, json!([["BTC", "bitcoin", "1", "1", "0", ""]])).await;
        Mock::given(method("POST"))
            .and(path("/v4/spreadsheets/sheet-1/values/Main!A2:F2:clear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server).delete_holding("Main", "BTC").await.unwrap();
    }
}
