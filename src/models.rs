//! Row types for the moderation tables.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use crate::clock::parse_utc;

/// Moderation sanctions, declared from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PenaltyType {
    Warning,
    #[serde(rename = "temp_ban_24h")]
    #[sqlx(rename = "temp_ban_24h")]
    TempBan24h,
    #[serde(rename = "temp_ban_7d")]
    #[sqlx(rename = "temp_ban_7d")]
    TempBan7d,
    #[serde(rename = "temp_ban_30d")]
    #[sqlx(rename = "temp_ban_30d")]
    TempBan30d,
    PermanentBan,
}

impl PenaltyType {
    /// Every penalty type, in severity order.
    pub const ALL: [Self; 5] = [
        Self::Warning,
        Self::TempBan24h,
        Self::TempBan7d,
        Self::TempBan30d,
        Self::PermanentBan,
    ];

    /// Position on the escalation ladder. Higher is more severe.
    pub const fn severity(self) -> u8 {
        match self {
            Self::Warning => 0,
            Self::TempBan24h => 1,
            Self::TempBan7d => 2,
            Self::TempBan30d => 3,
            Self::PermanentBan => 4,
        }
    }

    /// Ban length. `None` for warnings (no ban at all) and permanent bans (never ends).
    pub fn duration(self) -> Option<Duration> {
        match self {
            Self::Warning | Self::PermanentBan => None,
            Self::TempBan24h => Some(Duration::hours(24)),
            Self::TempBan7d => Some(Duration::hours(168)),
            Self::TempBan30d => Some(Duration::hours(720)),
        }
    }

    /// How far back a prior penalty of this type counts toward escalation.
    pub fn lookback(self) -> Duration {
        match self {
            Self::Warning | Self::TempBan24h | Self::TempBan7d => Duration::days(30),
            Self::TempBan30d | Self::PermanentBan => Duration::days(90),
        }
    }

    /// The next rung up the ladder, saturating at a permanent ban.
    pub const fn escalate(self) -> Self {
        match self {
            Self::Warning => Self::TempBan24h,
            Self::TempBan24h => Self::TempBan7d,
            Self::TempBan7d => Self::TempBan30d,
            Self::TempBan30d | Self::PermanentBan => Self::PermanentBan,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::TempBan24h => "temp_ban_24h",
            Self::TempBan7d => "temp_ban_7d",
            Self::TempBan30d => "temp_ban_30d",
            Self::PermanentBan => "permanent_ban",
        }
    }
}

impl std::fmt::Display for PenaltyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a penalty row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PenaltyStatus {
    /// In force (unless its `expires_at` has passed and the sweep has not run yet).
    Active,
    Expired,
    Revoked,
    /// Suspended while its single appeal is pending.
    Appealed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Penalty {
    pub id: i64,
    pub user_id: i64,
    pub penalty_type: PenaltyType,
    pub status: PenaltyStatus,
    pub reason: String,
    pub issued_by: i64,
    pub issued_at: DateTime<Utc>,
    /// `None` for warnings and permanent bans.
    pub expires_at: Option<DateTime<Utc>>,
    pub related_flag_ids: Json<Vec<i64>>,
    pub revoked_by: Option<i64>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
}

impl Penalty {
    /// Whether the ban length has run out. Never true for warnings or permanent bans.
    pub fn has_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// ACTIVE and not yet past its expiry.
    pub fn is_in_force(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            PenaltyStatus::Active => !self.has_elapsed(now),
            PenaltyStatus::Expired | PenaltyStatus::Revoked | PenaltyStatus::Appealed => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appeal {
    pub id: i64,
    pub penalty_id: i64,
    pub user_id: i64,
    pub reason: String,
    pub status: AppealStatus,
    pub created_at: DateTime<Utc>,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_notes: Option<String>,
}

/// Reputation-relevant columns of a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub is_global_admin: bool,
    pub requires_comment_approval: bool,
    pub trust_score: i64,
    pub approved_comments_count: i64,
    pub valid_flags_received: i64,
    pub flags_submitted_validated: i64,
    /// Stored as text; older rows are naive (no offset).
    pub created_at: String,
}

impl User {
    /// Registration time normalized to UTC.
    pub fn registered_at(&self) -> Option<DateTime<Utc>> {
        parse_utc(&self.created_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum ContentType {
    Idea,
    Comment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FlagStatus {
    Pending,
    Upheld,
    Dismissed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ContentFlag {
    pub id: i64,
    pub content_type: ContentType,
    pub content_id: i64,
    pub reporter_id: i64,
    pub reason: String,
    pub details: Option<String>,
    pub status: FlagStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct KeywordWatch {
    pub id: i64,
    pub keyword: String,
    pub is_regex: bool,
    pub auto_flag_reason: String,
    pub is_active: bool,
    pub match_count: i64,
    pub created_at: DateTime<Utc>,
}
