// src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One portfolio line item: asset, quantity and price metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    /// Identifier used to query the market-data service. Holdings without
    /// one are skipped by the price sync.
    pub external_id: Option<String>,
    pub quantity: f64,
    pub current_price: f64,
    pub price_change_24h: f64,
    pub last_price_update: Option<DateTime<Utc>>,
}

/// Current price and 24h change for one external id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub price: f64,
    pub change_24h: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Updated,
    SkippedNoId,
    FetchError,
    PersistenceError,
}

/// Per-holding result of a price-sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub symbol: String,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateOutcome {
    pub fn updated(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: OutcomeStatus::Updated,
            error: None,
        }
    }

    pub fn skipped_no_id(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: OutcomeStatus::SkippedNoId,
            error: None,
        }
    }

    pub fn fetch_error(symbol: &str, message: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: OutcomeStatus::FetchError,
            error: Some(message.to_string()),
        }
    }

    pub fn persistence_error(symbol: &str, message: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            status: OutcomeStatus::PersistenceError,
            error: Some(message.to_string()),
        }
    }
}

/// Aggregate result of one price-sync run. Always covers every holding
/// that was enumerated: total == updated + failed + skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub total: usize,
    pub updated_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub outcomes: Vec<UpdateOutcome>,
}

impl SyncSummary {
    pub fn from_outcomes(outcomes: Vec<UpdateOutcome>) -> Self {
        let updated_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Updated)
            .count();
        let skipped_count = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::SkippedNoId)
            .count();
        let failed_count = outcomes.len() - updated_count - skipped_count;
        Self {
            success: failed_count == 0,
            total: outcomes.len(),
            updated_count,
            failed_count,
            skipped_count,
            outcomes,
        }
    }
}

/// Body for POST /portfolio/{id}/assets.
#[derive(Debug, Deserialize)]
pub struct NewHolding {
    pub symbol: String,
    pub external_id: Option<String>,
    pub quantity: f64,
}

/// Body for PUT /portfolio/{id}/assets/{symbol}. Absent fields keep their
/// stored value; an explicit `"external_id": null` clears the id.
#[derive(Debug, Deserialize)]
pub struct HoldingPatch {
    #[serde(default, deserialize_with = "double_option")]
    pub external_id: Option<Option<String>>,
    pub quantity: Option<f64>,
}

/// Keeps the absent-vs-null distinction: a missing field stays `None`
/// via the default, a present field (null included) becomes `Some(..)`.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer).map(Some)
}
