use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{Appeal, AppealStatus};

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    penalty_id: i64,
    user_id: i64,
    reason: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<Appeal> {
    sqlx::query_as(
        r#"
        INSERT INTO appeal (penalty_id, user_id, reason, status, created_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
        "#,
    )
    .bind(penalty_id)
    .bind(user_id)
    .bind(reason)
    .bind(AppealStatus::Pending)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Appeal>> {
    sqlx::query_as("SELECT * FROM appeal WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn get_pending(
    conn: &mut SqliteConnection,
    id: i64,
) -> sqlx::Result<Option<Appeal>> {
    sqlx::query_as("SELECT * FROM appeal WHERE id = ? AND status = ?")
        .bind(id)
        .bind(AppealStatus::Pending)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn exists_for_penalty(
    conn: &mut SqliteConnection,
    penalty_id: i64,
) -> sqlx::Result<bool> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM appeal WHERE penalty_id = ?")
        .bind(penalty_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

/// Move a pending appeal to its terminal status.
pub(crate) async fn resolve(
    conn: &mut SqliteConnection,
    id: i64,
    status: AppealStatus,
    reviewed_by: i64,
    reviewed_at: DateTime<Utc>,
    notes: &str,
) -> sqlx::Result<Appeal> {
    sqlx::query_as(
        r#"
        UPDATE appeal
            SET status = ?, reviewed_by = ?, reviewed_at = ?, review_notes = ?
            WHERE id = ?
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(reviewed_by)
    .bind(reviewed_at)
    .bind(notes)
    .bind(id)
    .fetch_one(&mut *conn)
    .await
}

/// Pending appeals, oldest first.
pub(crate) async fn list_pending(conn: &mut SqliteConnection) -> sqlx::Result<Vec<Appeal>> {
    sqlx::query_as("SELECT * FROM appeal WHERE status = ? ORDER BY id ASC")
        .bind(AppealStatus::Pending)
        .fetch_all(&mut *conn)
        .await
}

pub(crate) async fn list_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> sqlx::Result<Vec<Appeal>> {
    sqlx::query_as("SELECT * FROM appeal WHERE user_id = ? ORDER BY id DESC")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
}
