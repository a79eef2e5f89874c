use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Appeal, Penalty},
    moderation::{Moderation, PenaltyRequest},
    serve::{AppState, Result},
};

#[derive(Deserialize)]
struct RevokeInput {
    revoked_by: i64,
    reason: String,
}

#[derive(Deserialize)]
struct AppealInput {
    user_id: i64,
    reason: String,
}

#[derive(Serialize)]
struct ExpireOutput {
    expired: u64,
}

async fn issue(
    State(moderation): State<Moderation>,
    Json(input): Json<PenaltyRequest>,
) -> Result<Json<Penalty>> {
    Ok(Json(moderation.ledger.issue_penalty(input).await?))
}

async fn get_penalty(
    State(moderation): State<Moderation>,
    Path(penalty_id): Path<i64>,
) -> Result<Json<Penalty>> {
    Ok(Json(moderation.ledger.get_penalty(penalty_id).await?))
}

async fn revoke(
    State(moderation): State<Moderation>,
    Path(penalty_id): Path<i64>,
    Json(input): Json<RevokeInput>,
) -> Result<Json<Penalty>> {
    let penalty = moderation
        .ledger
        .revoke_penalty(penalty_id, input.revoked_by, &input.reason)
        .await?;
    Ok(Json(penalty))
}

async fn appeal(
    State(moderation): State<Moderation>,
    Path(penalty_id): Path<i64>,
    Json(input): Json<AppealInput>,
) -> Result<Json<Appeal>> {
    let appeal = moderation
        .appeals
        .submit_appeal(penalty_id, input.user_id, &input.reason)
        .await?;
    Ok(Json(appeal))
}

/// Run one expiry sweep now, on top of the periodic one.
async fn expire(State(moderation): State<Moderation>) -> Result<Json<ExpireOutput>> {
    let expired = moderation.ledger.expire_old_penalties().await?;
    Ok(Json(ExpireOutput { expired }))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/penalties",             post(issue))
        .route("/penalties/expire",      post(expire))
        .route("/penalties/{id}",        get(get_penalty))
        .route("/penalties/{id}/revoke", post(revoke))
        .route("/penalties/{id}/appeal", post(appeal))
}
