use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::KeywordWatch;

pub(crate) async fn insert(
    conn: &mut SqliteConnection,
    keyword: &str,
    is_regex: bool,
    auto_flag_reason: &str,
    created_at: DateTime<Utc>,
) -> sqlx::Result<KeywordWatch> {
    sqlx::query_as(
        r#"
        INSERT INTO keyword_watchlist (keyword, is_regex, auto_flag_reason, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
        "#,
    )
    .bind(keyword)
    .bind(is_regex)
    .bind(auto_flag_reason)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await
}

pub(crate) async fn list(conn: &mut SqliteConnection) -> sqlx::Result<Vec<KeywordWatch>> {
    sqlx::query_as("SELECT * FROM keyword_watchlist ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub(crate) async fn list_active(conn: &mut SqliteConnection) -> sqlx::Result<Vec<KeywordWatch>> {
    sqlx::query_as("SELECT * FROM keyword_watchlist WHERE is_active = 1 ORDER BY id")
        .fetch_all(&mut *conn)
        .await
}

pub(crate) async fn set_active(
    conn: &mut SqliteConnection,
    id: i64,
    is_active: bool,
) -> sqlx::Result<Option<KeywordWatch>> {
    sqlx::query_as("UPDATE keyword_watchlist SET is_active = ? WHERE id = ? RETURNING *")
        .bind(is_active)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

pub(crate) async fn record_match(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    _ = sqlx::query("UPDATE keyword_watchlist SET match_count = match_count + 1 WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
