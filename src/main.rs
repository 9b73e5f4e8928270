// src/main.rs
mod api;
mod config;
mod error;
mod models;
mod prices;
mod report;
mod store;
mod sync;

use crate::config::Config;
use crate::prices::CoinGeckoClient;
use crate::report::ReportDrafter;
use crate::store::{HoldingStore, SheetsStore};
use crate::sync::PriceSyncer;
use env_logger::Builder;
use log::{error, info, LevelFilter};
use reqwest::Client;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return;
        }
    };

    // One HTTP client for every adapter; its timeout bounds the price
    // fetch and each store write.
    let client = match Client::builder().timeout(config.http_timeout).build() {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to build HTTP client: {}", e);
            return;
        }
    };

    let store: Arc<dyn HoldingStore> = Arc::new(SheetsStore::new(
        client.clone(),
        &config.sheets_base_url,
        &config.spreadsheet_id,
        config.sheets_api_key.clone(),
    ));
    let prices = Arc::new(CoinGeckoClient::new(
        client.clone(),
        &config.prices_base_url,
        config.prices_api_key.clone(),
    ));
    let syncer = Arc::new(PriceSyncer::new(store.clone(), prices));
    let reporter = Arc::new(ReportDrafter::new(client, config.report_api_url.clone()));

    info!("Starting the fund tracker application...");
    let routes = api::routes(store, syncer, reporter);

    info!("Server running on http://{}", config.bind_addr);
    warp::serve(routes).run(config.bind_addr).await;
}
