use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    models::Appeal,
    moderation::{Moderation, ReviewAction},
    serve::{AppState, Result},
};

#[derive(Deserialize)]
struct ReviewInput {
    reviewer_id: i64,
    /// `approve` or `reject`. Parsed by hand so other values get a 400 from the domain.
    action: String,
    #[serde(default)]
    notes: String,
}

async fn list_pending(State(moderation): State<Moderation>) -> Result<Json<Vec<Appeal>>> {
    Ok(Json(moderation.appeals.list_pending_appeals().await?))
}

async fn get_appeal(
    State(moderation): State<Moderation>,
    Path(appeal_id): Path<i64>,
) -> Result<Json<Appeal>> {
    Ok(Json(moderation.appeals.get_appeal(appeal_id).await?))
}

async fn review(
    State(moderation): State<Moderation>,
    Path(appeal_id): Path<i64>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Appeal>> {
    let action: ReviewAction = input.action.parse()?;
    let appeal = moderation
        .appeals
        .review_appeal(appeal_id, input.reviewer_id, action, &input.notes)
        .await?;
    Ok(Json(appeal))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/appeals/pending",     get(list_pending))
        .route("/appeals/{id}",        get(get_appeal))
        .route("/appeals/{id}/review", post(review))
}
