// src/report.rs
use crate::models::Holding;
use chrono::{DateTime, Utc};
use log::warn;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Drafts a markdown portfolio report from the current holdings. When a
/// completion endpoint is configured the deterministic draft is sent there
/// for rewording; any failure on that path falls back to the draft, so
/// report generation itself never fails.
pub struct ReportDrafter {
    client: Client,
    completion_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportDraft {
    pub portfolio_id: String,
    pub generated_at: DateTime<Utc>,
    pub body: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

impl ReportDrafter {
    pub fn new(client: Client, completion_url: Option<String>) -> Self {
        Self {
            client,
            completion_url,
        }
    }

    pub async fn draft(&self, portfolio_id: &str, holdings: &[Holding]) -> ReportDraft {
        let body = render_markdown(portfolio_id, holdings);
        let body = match &self.completion_url {
            Some(url) => self.reword(url, &body).await.unwrap_or(body),
            None => body,
        };
        ReportDraft {
            portfolio_id: portfolio_id.to_string(),
            generated_at: Utc::now(),
            body,
        }
    }

    async fn reword(&self, url: &str, draft: &str) -> Option<String> {
        let result = self
            .client
            .post(url)
            .json(&json!({
                "prompt": format!(
                    "Rewrite this portfolio report draft as concise prose:\n\n{}",
                    draft
                )
            }))
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<CompletionResponse>().await {
                    Ok(completion) => Some(completion.text),
                    Err(e) => {
                        warn!("Report completion returned malformed payload: {}", e);
                        None
                    }
                }
            }
            Ok(response) => {
                warn!("Report completion failed: HTTP {}", response.status());
                None
            }
            Err(e) => {
                warn!("Report completion request failed: {}", e);
                None
            }
        }
    }
}

fn render_markdown(portfolio_id: &str, holdings: &[Holding]) -> String {
    let total_value: f64 = holdings.iter().map(|h| h.quantity * h.current_price).sum();
    let stalest = holdings
        .iter()
        .filter_map(|h| h.last_price_update)
        .min()
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());

    let mut movers: Vec<&Holding> = holdings.iter().collect();
    movers.sort_by(|a, b| {
        b.price_change_24h
            .abs()
            .partial_cmp(&a.price_change_24h.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = String::new();
    out.push_str(&format!("# Portfolio report: {}\n\n", portfolio_id));
    out.push_str(&format!(
        "Holdings: {} | Total value: {:.2} USD | Oldest price: {}\n\n",
        holdings.len(),
        total_value,
        stalest
    ));
    out.push_str("| Symbol | Quantity | Price | 24h |\n|---|---|---|---|\n");
    for h in holdings {
        out.push_str(&format!(
            "| {} | {} | {:.2} | {:+.2}% |\n",
            h.symbol, h.quantity, h.current_price, h.price_change_24h
        ));
    }
    if let Some(top) = movers.first().filter(|h| h.price_change_24h != 0.0) {
        out.push_str(&format!(
            "\nBiggest 24h move: {} at {:+.2}%.\n",
            top.symbol, top.price_change_24h
        ));
    }
    out
}
