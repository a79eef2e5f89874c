//! JSON routes for the moderation services, nested under `/v1/moderation`.
//!
//! Acting user ids (issuer, reviewer, appellant) arrive in request bodies. Authentication
//! is handled by whatever sits in front of this router.

use axum::Router;

use crate::serve::AppState;

mod appeals;
mod content;
mod penalties;
mod users;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(users::routes())
        .merge(penalties::routes())
        .merge(appeals::routes())
        .merge(content::routes())
}
