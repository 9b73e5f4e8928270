// src/config.rs
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_PRICES_URL: &str = "https://api.coingecko.com";

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Id of the spreadsheet acting as the backing store.
    pub spreadsheet_id: String,
    /// API key for the spreadsheet API, if the sheet is not public.
    pub sheets_api_key: Option<String>,
    pub sheets_base_url: String,
    pub prices_base_url: String,
    /// Optional demo key for the market-data service.
    pub prices_api_key: Option<String>,
    /// Optional completion endpoint used to reword report drafts.
    pub report_api_url: Option<String>,
    /// Bound on every outbound request (price fetch and each store write).
    pub http_timeout: Duration,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let spreadsheet_id = env::var("SHEETS_SPREADSHEET_ID")
            .map_err(|_| "SHEETS_SPREADSHEET_ID is not set".to_string())?;
        let timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);
        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3030".to_string())
            .parse()
            .map_err(|e| format!("invalid BIND_ADDR: {}", e))?;
        Ok(Self {
            spreadsheet_id,
            sheets_api_key: env::var("SHEETS_API_KEY").ok(),
            sheets_base_url: env::var("SHEETS_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SHEETS_URL.to_string()),
            prices_base_url: env::var("PRICES_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PRICES_URL.to_string()),
            prices_api_key: env::var("COINGECKO_API_KEY").ok(),
            report_api_url: env::var("REPORT_API_URL").ok(),
            http_timeout: Duration::from_secs(timeout_secs),
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_spreadsheet_id_is_an_error() {
        env::remove_var("SHEETS_SPREADSHEET_ID");
        let err = Config::from_env().unwrap_err();
        assert!(err.contains("SHEETS_SPREADSHEET_ID"));
    }
}
