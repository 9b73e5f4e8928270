// src/api.rs
use crate::error::{CustomError, SyncError};
use crate::models::{Holding, HoldingPatch, NewHolding};
use crate::report::ReportDrafter;
use crate::store::{HoldingStore, StoreError};
use crate::sync::PriceSyncer;
use log::{error, info};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

#[derive(Debug)]
struct NotFound {
    message: String,
}

impl warp::reject::Reject for NotFound {}

pub fn routes(
    store: Arc<dyn HoldingStore>,
    syncer: Arc<PriceSyncer>,
    reporter: Arc<ReportDrafter>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let list = warp::path!("portfolio" / String)
        .and(warp::get())
        .and(with_store(store.clone()))
        .and_then(list_holdings_handler);

    let add = warp::path!("portfolio" / String / "assets")
        .and(warp::post())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(add_holding_handler);

    let edit = warp::path!("portfolio" / String / "assets" / String)
        .and(warp::put())
        .and(with_store(store.clone()))
        .and(warp::body::json())
        .and_then(edit_holding_handler);

    let delete = warp::path!("portfolio" / String / "assets" / String)
        .and(warp::delete())
        .and(with_store(store.clone()))
        .and_then(delete_holding_handler);

    let sync = warp::path!("portfolio" / String / "sync")
        .and(warp::post())
        .and(with_syncer(syncer))
        .and_then(sync_handler);

    let report = warp::path!("portfolio" / String / "report")
        .and(warp::get())
        .and(with_store(store))
        .and(with_reporter(reporter))
        .and_then(report_handler);

    list.or(add)
        .or(edit)
        .or(delete)
        .or(sync)
        .or(report)
        .recover(handle_rejection)
}

fn with_store(
    store: Arc<dyn HoldingStore>,
) -> impl Filter<Extract = (Arc<dyn HoldingStore>,), Error = Infallible> + Clone {
    warp::any().map(move || store.clone())
}

fn with_syncer(
    syncer: Arc<PriceSyncer>,
) -> impl Filter<Extract = (Arc<PriceSyncer>,), Error = Infallible> + Clone {
    warp::any().map(move || syncer.clone())
}

fn with_reporter(
    reporter: Arc<ReportDrafter>,
) -> impl Filter<Extract = (Arc<ReportDrafter>,), Error = Infallible> + Clone {
    warp::any().map(move || reporter.clone())
}

fn store_rejection(e: StoreError) -> Rejection {
    match e {
        StoreError::NotFound(symbol) => warp::reject::custom(NotFound {
            message: format!("symbol not found: {}", symbol),
        }),
        other => warp::reject::custom(CustomError {
            message: other.to_string(),
        }),
    }
}

async fn list_holdings_handler(
    portfolio_id: String,
    store: Arc<dyn HoldingStore>,
) -> Result<impl Reply, Rejection> {
    match store.list_holdings(&portfolio_id).await {
        Ok(holdings) => Ok(warp::reply::json(&holdings)),
        Err(e) => {
            error!("Failed to list holdings for {}: {}", portfolio_id, e);
            Err(store_rejection(e))
        }
    }
}

async fn add_holding_handler(
    portfolio_id: String,
    store: Arc<dyn HoldingStore>,
    body: NewHolding,
) -> Result<impl Reply, Rejection> {
    let holding = Holding {
        symbol: body.symbol,
        external_id: body.external_id,
        quantity: body.quantity,
        current_price: 0.0,
        price_change_24h: 0.0,
        last_price_update: None,
    };
    match store.add_holding(&portfolio_id, &holding).await {
        Ok(()) => {
            info!("Added {} to portfolio {}", holding.symbol, portfolio_id);
            Ok(warp::reply::with_status("Holding added", StatusCode::CREATED))
        }
        Err(e) => {
            error!("Failed to add holding: {}", e);
            Err(store_rejection(e))
        }
    }
}

async fn edit_holding_handler(
    portfolio_id: String,
    symbol: String,
    store: Arc<dyn HoldingStore>,
    patch: HoldingPatch,
) -> Result<impl Reply, Rejection> {
    match store.edit_holding(&portfolio_id, &symbol, &patch).await {
        Ok(()) => {
            info!("Updated {} in portfolio {}", symbol, portfolio_id);
            Ok(warp::reply::with_status("Holding updated", StatusCode::OK))
        }
        Err(e) => {
            error!("Failed to edit {}: {}", symbol, e);
            Err(store_rejection(e))
        }
    }
}

async fn delete_holding_handler(
    portfolio_id: String,
    symbol: String,
    store: Arc<dyn HoldingStore>,
) -> Result<impl Reply, Rejection> {
    match store.delete_holding(&portfolio_id, &symbol).await {
        Ok(()) => {
            info!("Deleted {} from portfolio {}", symbol, portfolio_id);
            Ok(warp::reply::with_status("Holding deleted", StatusCode::OK))
        }
        Err(e) => {
            error!("Failed to delete {}: {}", symbol, e);
            Err(store_rejection(e))
        }
    }
}

async fn sync_handler(
    portfolio_id: String,
    syncer: Arc<PriceSyncer>,
) -> Result<impl Reply, Rejection> {
    match syncer.run(&portfolio_id).await {
        Ok(summary) => Ok(warp::reply::json(&summary)),
        Err(e) => {
            error!("Price sync failed for {}: {}", portfolio_id, e);
            Err(warp::reject::custom(e))
        }
    }
}

async fn report_handler(
    portfolio_id: String,
    store: Arc<dyn HoldingStore>,
    reporter: Arc<ReportDrafter>,
) -> Result<impl Reply, Rejection> {
    match store.list_holdings(&portfolio_id).await {
        Ok(holdings) => {
            let draft = reporter.draft(&portfolio_id, &holdings).await;
            Ok(warp::reply::json(&draft))
        }
        Err(e) => {
            error!("Failed to draft report for {}: {}", portfolio_id, e);
            Err(store_rejection(e))
        }
    }
}

/// Fatal errors become complete JSON error responses; per-holding errors
/// never reach this point, they live inside the sync summary.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(e) = err.find::<SyncError>() {
        let status = match e {
            SyncError::BackingStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SyncError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
        };
        (status, e.to_string())
    } else if let Some(e) = err.find::<NotFound>() {
        (StatusCode::NOT_FOUND, e.message.clone())
    } else if let Some(e) = err.find::<CustomError>() {
        (StatusCode::INTERNAL_SERVER_ERROR, e.message.clone())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "unhandled error".to_string())
    };

    let body = warp::reply::json(&json!({ "success": false, "error": message }));
    Ok(warp::reply::with_status(body, status))
}
