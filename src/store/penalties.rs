use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, types::Json};

use crate::models::{Penalty, PenaltyStatus, PenaltyType};

#[derive(Debug, Clone)]
pub(crate) struct NewPenalty<'a> {
    pub user_id: i64,
    pub penalty_type: PenaltyType,
    pub reason: &'a str,
    pub issued_by: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub related_flag_ids: &'a [i64],
}

/// Insert a new ACTIVE penalty.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    penalty: &NewPenalty<'_>,
) -> sqlx::Result<Penalty> {
    sqlx::query_as(
        r#"
        INSERT INTO penalty
            (user_id, penalty_type, status, reason, issued_by, issued_at, expires_at, related_flag_ids)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
        "#,
    )
    .bind(penalty.user_id)
    .bind(penalty.penalty_type)
    .bind(PenaltyStatus::Active)
    .bind(penalty.reason)
    .bind(penalty.issued_by)
    .bind(penalty.issued_at)
    .bind(penalty.expires_at)
    .bind(Json(penalty.related_flag_ids))
    .fetch_one(&mut *conn)
    .await
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Penalty>> {
    sqlx::query_as("SELECT * FROM penalty WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// The user's ACTIVE row, if any. Expiry time is not considered here.
pub(crate) async fn find_active(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> sqlx::Result<Option<Penalty>> {
    sqlx::query_as("SELECT * FROM penalty WHERE user_id = ? AND status = ?")
        .bind(user_id)
        .bind(PenaltyStatus::Active)
        .fetch_optional(&mut *conn)
        .await
}

/// All of a user's penalties, newest first.
pub(crate) async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> sqlx::Result<Vec<Penalty>> {
    sqlx::query_as("SELECT * FROM penalty WHERE user_id = ? ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}

/// ACTIVE penalties that carry an expiry time, across all users.
pub(crate) async fn list_active_timed(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Penalty>> {
    sqlx::query_as("SELECT * FROM penalty WHERE status = ? AND expires_at IS NOT NULL")
        .bind(PenaltyStatus::Active)
        .fetch_all(&mut *conn)
        .await
}

pub(crate) async fn set_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: PenaltyStatus,
) -> sqlx::Result<Penalty> {
    sqlx::query_as("UPDATE penalty SET status = ? WHERE id = ? RETURNING *")
        .bind(status)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
}

pub(crate) async fn mark_revoked(
    conn: &mut SqliteConnection,
    id: i64,
    revoked_by: i64,
    revoked_at: DateTime<Utc>,
    reason: &str,
) -> sqlx::Result<Penalty> {
    sqlx::query_as(
        r#"
        UPDATE penalty
            SET status = ?, revoked_by = ?, revoked_at = ?, revoke_reason = ?
            WHERE id = ?
            RETURNING *
        "#,
    )
    .bind(PenaltyStatus::Revoked)
    .bind(revoked_by)
    .bind(revoked_at)
    .bind(reason)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
}
