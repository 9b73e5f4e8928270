// src/sync.rs
use crate::error::SyncError;
use crate::models::{Holding, PriceQuote, SyncSummary, UpdateOutcome};
use crate::prices::PriceService;
use crate::store::HoldingStore;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// A holding matched to a fresh quote, waiting to be written back.
struct CandidateUpdate {
    symbol: String,
    new_price: f64,
    new_change_24h: f64,
}

enum Reconciled {
    Terminal(UpdateOutcome),
    Candidate(CandidateUpdate),
}

/// The price-synchronization workflow: enumerate holdings, fetch quotes in
/// one bulk call, reconcile, then write updates back one at a time.
///
/// Fatal failures (store unreachable, price service down) abort the run.
/// Per-holding failures never do; they end up in the summary. Every
/// enumerated holding yields exactly one outcome.
pub struct PriceSyncer {
    store: Arc<dyn HoldingStore>,
    prices: Arc<dyn PriceService>,
}

impl PriceSyncer {
    pub fn new(store: Arc<dyn HoldingStore>, prices: Arc<dyn PriceService>) -> Self {
        Self { store, prices }
    }

    pub async fn run(&self, portfolio_id: &str) -> Result<SyncSummary, SyncError> {
        let holdings = self
            .store
            .list_holdings(portfolio_id)
            .await
            .map_err(|e| SyncError::BackingStoreUnavailable(e.to_string()))?;
        info!(
            "Price sync started for {}: {} holdings",
            portfolio_id,
            holdings.len()
        );

        let ids = distinct_external_ids(&holdings);
        let quotes = if ids.is_empty() {
            HashMap::new()
        } else {
            self.prices.get_prices(&ids).await?
        };

        let reconciled: Vec<Reconciled> =
            holdings.iter().map(|h| reconcile(h, &quotes)).collect();

        let mut outcomes = Vec::with_capacity(reconciled.len());
        for item in reconciled {
            match item {
                Reconciled::Terminal(outcome) => outcomes.push(outcome),
                Reconciled::Candidate(candidate) => {
                    // One write at a time, in enumeration order; a failed
                    // write never blocks the ones after it.
                    let result = self
                        .store
                        .update_holding_price(
                            portfolio_id,
                            &candidate.symbol,
                            candidate.new_price,
                            candidate.new_change_24h,
                        )
                        .await;
                    outcomes.push(match result {
                        Ok(()) => UpdateOutcome::updated(&candidate.symbol),
                        Err(e) => {
                            error!("Failed to store price for {}: {}", candidate.symbol, e);
                            UpdateOutcome::persistence_error(&candidate.symbol, &e.to_string())
                        }
                    });
                }
            }
        }

        let summary = SyncSummary::from_outcomes(outcomes);
        info!(
            "Price sync finished for {}: {} updated, {} failed, {} skipped",
            portfolio_id, summary.updated_count, summary.failed_count, summary.skipped_count
        );
        Ok(summary)
    }
}

/// External ids deduplicated across holdings, in first-seen order.
fn distinct_external_ids(holdings: &[Holding]) -> Vec<String> {
    let mut ids = Vec::new();
    for holding in holdings {
        if let Some(id) = &holding.external_id {
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
    }
    ids
}

fn reconcile(holding: &Holding, quotes: &HashMap<String, PriceQuote>) -> Reconciled {
    let id = match &holding.external_id {
        Some(id) => id,
        None => return Reconciled::Terminal(UpdateOutcome::skipped_no_id(&holding.symbol)),
    };
    match quotes.get(id) {
        // Zero and negative quotes pass through unvalidated.
        Some(quote) => Reconciled::Candidate(CandidateUpdate {
            symbol: holding.symbol.clone(),
            new_price: quote.price,
            new_change_24h: quote.change_24h,
        }),
        None => {
            warn!("No quote for {} (id {})", holding.symbol, id);
            Reconciled::Terminal(UpdateOutcome::fetch_error(
                &holding.symbol,
                "price not found in response",
            ))
        }
    }
}
