use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Appeal, Penalty, PenaltyType},
    moderation::{Admission, Moderation, TrustProfile},
    serve::{AppState, Result},
};

/// Reputation events reported by the rest of the platform.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum CounterEvent {
    CommentApproved,
    FlagUpheld,
    ReportValidated,
}

#[derive(Serialize)]
struct ScoreOutput {
    score: i64,
}

#[derive(Serialize)]
struct BanOutput {
    banned: bool,
    penalty: Option<Penalty>,
}

#[derive(Serialize)]
struct AdmissionOutput {
    admission: Admission,
}

#[derive(Serialize)]
struct NextPenaltyOutput {
    penalty_type: PenaltyType,
}

async fn trust_profile(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<TrustProfile>> {
    Ok(Json(moderation.trust.profile(user_id).await?))
}

async fn recalculate(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<ScoreOutput>> {
    let score = moderation.trust.recalculate(user_id).await?;
    Ok(Json(ScoreOutput { score }))
}

async fn record_event(
    State(moderation): State<Moderation>,
    Path((user_id, event)): Path<(i64, CounterEvent)>,
) -> Result<Json<ScoreOutput>> {
    let trust = &moderation.trust;
    let score = match event {
        CounterEvent::CommentApproved => trust.record_comment_approved(user_id).await?,
        CounterEvent::FlagUpheld => trust.record_flag_upheld(user_id).await?,
        CounterEvent::ReportValidated => trust.record_report_validated(user_id).await?,
    };
    Ok(Json(ScoreOutput { score }))
}

async fn ban_status(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<BanOutput>> {
    let penalty = moderation.ledger.check_user_banned(user_id).await?;
    Ok(Json(BanOutput {
        banned: penalty.is_some(),
        penalty,
    }))
}

async fn admission(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<AdmissionOutput>> {
    let admission = moderation.gate.admission(user_id).await?;
    Ok(Json(AdmissionOutput { admission }))
}

async fn list_penalties(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Penalty>>> {
    Ok(Json(moderation.ledger.list_user_penalties(user_id).await?))
}

async fn active_penalty(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<Option<Penalty>>> {
    Ok(Json(moderation.ledger.get_active_penalty(user_id).await?))
}

async fn next_penalty(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<NextPenaltyOutput>> {
    let penalty_type = moderation.ledger.get_next_penalty_type(user_id).await?;
    Ok(Json(NextPenaltyOutput { penalty_type }))
}

async fn list_appeals(
    State(moderation): State<Moderation>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Appeal>>> {
    Ok(Json(moderation.appeals.list_user_appeals(user_id).await?))
}

#[rustfmt::skip]
pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/{id}/trust",             get(trust_profile))
        .route("/users/{id}/trust/recalculate", post(recalculate))
        .route("/users/{id}/events/{event}",    post(record_event))
        .route("/users/{id}/ban",               get(ban_status))
        .route("/users/{id}/admission",         get(admission))
        .route("/users/{id}/penalties",         get(list_penalties))
        .route("/users/{id}/penalties/active",  get(active_penalty))
        .route("/users/{id}/penalties/next",    get(next_penalty))
        .route("/users/{id}/appeals",           get(list_appeals))
}
