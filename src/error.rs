// src/error.rs
use thiserror::Error;
use warp::reject::Reject;

/// Fatal errors of the price-sync workflow. Per-holding failures are not
/// errors; they are recorded as `UpdateOutcome`s in the run summary.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The backing store could not be reached. Aborts the whole run, no
    /// partial enumeration.
    #[error("backing store unavailable: {0}")]
    BackingStoreUnavailable(String),

    /// The bulk price fetch failed (non-success status or a payload that
    /// did not match the expected schema). Fatal for the fetch step.
    #[error("price service error ({status}): {reason}")]
    ExternalService { status: u16, reason: String },
}

impl Reject for SyncError {}

/// Catch-all rejection for handler-level failures outside the sync
/// taxonomy (store CRUD, report drafting).
#[derive(Debug)]
pub struct CustomError {
    pub message: String,
}

impl std::fmt::Display for CustomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CustomError {}

impl Reject for CustomError {}
