use sqlx::SqliteConnection;

use crate::models::User;

/// Monotonic reputation counters on the user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    ApprovedComments,
    ValidFlagsReceived,
    FlagsSubmittedValidated,
}

impl Counter {
    const fn column(self) -> &'static str {
        match self {
            Self::ApprovedComments => "approved_comments_count",
            Self::ValidFlagsReceived => "valid_flags_received",
            Self::FlagsSubmittedValidated => "flags_submitted_validated",
        }
    }
}

/// Columns needed to create a user.
#[derive(Debug, Clone)]
pub(crate) struct NewUser<'a> {
    pub username: &'a str,
    pub is_global_admin: bool,
    pub requires_comment_approval: bool,
    pub created_at: &'a str,
}

pub(crate) async fn create(conn: &mut SqliteConnection, user: &NewUser<'_>) -> sqlx::Result<User> {
    sqlx::query_as(
        r#"
        INSERT INTO users (username, is_global_admin, requires_comment_approval, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
        "#,
    )
    .bind(user.username)
    .bind(user.is_global_admin)
    .bind(user.requires_comment_approval)
    .bind(user.created_at)
    .fetch_one(&mut *conn)
    .await
}

/// Insert the user with this id unless it already exists.
pub(crate) async fn ensure(
    conn: &mut SqliteConnection,
    id: i64,
    username: &str,
) -> sqlx::Result<()> {
    _ = sqlx::query("INSERT OR IGNORE INTO users (id, username) VALUES (?, ?)")
        .bind(id)
        .bind(username)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(crate) async fn get(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
}

/// Take the write lock by touching the user's row. Returns false if the user is missing.
///
/// Issuers call this before reading penalty state so that concurrent writers for the
/// same user queue up instead of reading the same snapshot.
pub(crate) async fn lock(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<bool> {
    let result = sqlx::query("UPDATE users SET username = username WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub(crate) async fn set_trust_score(
    conn: &mut SqliteConnection,
    id: i64,
    score: i64,
) -> sqlx::Result<()> {
    _ = sqlx::query("UPDATE users SET trust_score = ? WHERE id = ?")
        .bind(score)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Bump a counter by one. Returns false if the user is missing.
pub(crate) async fn increment(
    conn: &mut SqliteConnection,
    id: i64,
    counter: Counter,
) -> sqlx::Result<bool> {
    let column = counter.column();
    let sql = format!("UPDATE users SET {column} = {column} + 1 WHERE id = ?");
    let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
    Ok(result.rows_affected() == 1)
}
