//! Watchlist administration, content scanning and flag weighting.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    models::{ContentFlag, ContentType, KeywordWatch},
    moderation::Moderation,
    serve::{AppState, Result},
};

#[derive(Deserialize)]
struct KeywordInput {
    keyword: String,
    #[serde(default)]
    is_regex: bool,
    auto_flag_reason: String,
}

#[derive(Deserialize)]
struct ActiveInput {
    is_active: bool,
}

#[derive(Deserialize)]
struct ScanInput {
    content: String,
}

#[derive(Serialize)]
struct WeightOutput {
    weighted_flags: f64,
}

async fn list_keywords(State(moderation): State<Moderation>) -> Result<Json<Vec<KeywordWatch>>> {
    Ok(Json(moderation.watchlist.list_keywords().await?))
}

async fn add_keyword(
    State(moderation): State<Moderation>,
    Json(input): Json<KeywordInput>,
) -> Result<Json<KeywordWatch>> {
    let entry = moderation
        .watchlist
        .add_keyword(&input.keyword, input.is_regex, &input.auto_flag_reason)
        .await?;
    Ok(Json(entry))
}

async fn set_active(
    State(moderation): State<Moderation>,
    Path(keyword_id): Path<i64>,
    Json(input): Json<ActiveInput>,
) -> Result<Json<KeywordWatch>> {
    let entry = moderation
        .watchlist
        .set_keyword_active(keyword_id, input.is_active)
        .await?;
    Ok(Json(entry))
}

async fn scan(
    State(moderation): State<Moderation>,
    Path((content_type, content_id)): Path<(ContentType, i64)>,
    Json(input): Json<ScanInput>,
) -> Result<Json<Vec<ContentFlag>>> {
    let flags = moderation
        .watchlist
        .check_content_for_keywords(&input.content, content_type, content_id)
        .await?;
    Ok(Json(flags))
}

async fn weight(
    State(moderation): State<Moderation>,
    Path((content_type, content_id)): Path<(ContentType, i64)>,
) -> Result<Json<WeightOutput>> {
    let weighted_flags = moderation
        .weighting
        .weighted_flag_count(content_type, content_id)
        .await?;
    Ok(Json(WeightOutput { weighted_flags }))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/watchlist",                 get(list_keywords).post(add_keyword))
        .route("/watchlist/{id}/active",     post(set_active))
        .route("/content/{type}/{id}/scan",  post(scan))
        .route("/content/{type}/{id}/weight", get(weight))
}
