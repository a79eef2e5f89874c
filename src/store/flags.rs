use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{ContentFlag, ContentType, FlagStatus};

#[derive(Debug, Clone)]
pub(crate) struct NewFlag<'a> {
    pub content_type: ContentType,
    pub content_id: i64,
    pub reporter_id: i64,
    pub reason: &'a str,
    pub details: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

/// Insert a PENDING flag.
pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    flag: &NewFlag<'_>,
) -> sqlx::Result<ContentFlag> {
    sqlx::query_as(
        r#"
        INSERT INTO content_flag (content_type, content_id, reporter_id, reason, details, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
        "#,
    )
    .bind(flag.content_type)
    .bind(flag.content_id)
    .bind(flag.reporter_id)
    .bind(flag.reason)
    .bind(flag.details)
    .bind(FlagStatus::Pending)
    .bind(flag.created_at)
    .fetch_one(&mut *conn)
    .await
}

/// `(reporter_id, reporter trust score)` for every pending flag on a piece of content.
pub(crate) async fn pending_reporters(
    conn: &mut SqliteConnection,
    content_type: ContentType,
    content_id: i64,
) -> sqlx::Result<Vec<(i64, i64)>> {
    sqlx::query_as(
        r#"
        SELECT f.reporter_id, u.trust_score
            FROM content_flag f
            JOIN users u ON u.id = f.reporter_id
            WHERE f.content_type = ? AND f.content_id = ? AND f.status = ?
        "#,
    )
    .bind(content_type)
    .bind(content_id)
    .bind(FlagStatus::Pending)
    .fetch_all(&mut *conn)
    .await
}
