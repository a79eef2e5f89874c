//! Soft deletion of user-authored ideas and comments.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

/// Soft-delete the user's ideas awaiting approval and their unapproved comments.
/// Returns `(ideas, comments)` affected.
pub(crate) async fn soft_delete_pending(
    conn: &mut SqliteConnection,
    user_id: i64,
    reason: &str,
    deleted_at: DateTime<Utc>,
) -> sqlx::Result<(u64, u64)> {
    let ideas = sqlx::query(
        r#"
        UPDATE idea
            SET is_deleted = 1, deleted_at = ?, deletion_reason = ?
            WHERE user_id = ? AND status = 'pending' AND is_deleted = 0
        "#,
    )
    .bind(deleted_at)
    .bind(reason)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    let comments = sqlx::query(
        r#"
        UPDATE comment
            SET is_deleted = 1, deleted_at = ?, deletion_reason = ?
            WHERE user_id = ? AND is_approved = 0 AND is_deleted = 0
        "#,
    )
    .bind(deleted_at)
    .bind(reason)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    Ok((ideas.rows_affected(), comments.rows_affected()))
}
