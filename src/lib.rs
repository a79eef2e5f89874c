//! Moderation core for a civic participation platform.
//!
//! Trust scores, an escalating penalty ledger, single-shot appeals, a comment approval
//! gate, reporter-weighted flags and a keyword watchlist, backed by SQLite.
pub mod clock;
pub mod config;
pub mod db;
mod endpoints;
pub mod error;
mod metrics;
pub mod models;
pub mod moderation;
mod serve;
mod store;

pub use serve::{AppState, Args, router, run};

/// The index (/) route.
async fn index() -> impl axum::response::IntoResponse {
    r"
civicmod: moderation service for civic participation

Routes are under /v1/moderation/
    "
}
