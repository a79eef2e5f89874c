//! Trust score computation and the events that feed it.
//!
//! The score is a persisted value, recomputed by [`TrustScoreEngine::recalculate`] whenever
//! one of its inputs changes. It is never derived at read time: ban checks and flag
//! weighting want the value as of the last triggering event, and time-based penalty expiry
//! is deliberately not pushed into it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::{
    clock::Clock,
    db::{Db, retry_busy},
    error::ModerationError,
    metrics::TRUST_RECALCULATED,
    models::User,
    store::{
        penalties,
        users::{self, Counter},
    },
};

pub const MIN_SCORE: i64 = 0;
pub const MAX_SCORE: i64 = 100;
pub const BASE_SCORE: i64 = 50;

const MAX_AGE_BONUS: i64 = 20;
const DAYS_PER_AGE_POINT: i64 = 6;
const MAX_COMMENTS_BONUS: i64 = 15;
const COMMENTS_PER_POINT: i64 = 2;
const MAX_REPORTER_BONUS: i64 = 10;
const POINTS_PER_VALIDATED_REPORT: i64 = 2;
const POINTS_PER_UPHELD_FLAG: i64 = 10;
const ACTIVE_PENALTY_ADJUSTMENT: i64 = -20;

/// Scores at or below this always require comment approval.
const APPROVAL_SCORE_THRESHOLD: i64 = 40;
/// Users with fewer approved comments than this require comment approval.
const APPROVAL_MIN_COMMENTS: i64 = 5;

/// Everything the score depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrustInputs {
    pub days_since_registration: i64,
    pub approved_comments_count: i64,
    pub flags_submitted_validated: i64,
    pub valid_flags_received: i64,
    pub has_active_penalty: bool,
}

/// Compute a score in `[0, 100]`. Each bonus is capped on its own before summing; the
/// upheld-flag penalty is not.
pub fn calculate(inputs: &TrustInputs) -> i64 {
    let age_bonus = (inputs.days_since_registration.max(0) / DAYS_PER_AGE_POINT).min(MAX_AGE_BONUS);
    let comments_bonus =
        (inputs.approved_comments_count.max(0) / COMMENTS_PER_POINT).min(MAX_COMMENTS_BONUS);
    let reporter_bonus = inputs
        .flags_submitted_validated
        .max(0)
        .saturating_mul(POINTS_PER_VALIDATED_REPORT)
        .min(MAX_REPORTER_BONUS);
    let flags_penalty = inputs
        .valid_flags_received
        .max(0)
        .saturating_mul(POINTS_PER_UPHELD_FLAG);
    let penalty_adjustment = if inputs.has_active_penalty {
        ACTIVE_PENALTY_ADJUSTMENT
    } else {
        0
    };

    (BASE_SCORE + age_bonus + comments_bonus + reporter_bonus + penalty_adjustment)
        .saturating_sub(flags_penalty)
        .clamp(MIN_SCORE, MAX_SCORE)
}

/// Named bands over the score. Each band includes its upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustLevel {
    Low,
    BelowAverage,
    Average,
    Good,
    Excellent,
}

impl TrustLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::BelowAverage => "below_average",
            Self::Average => "average",
            Self::Good => "good",
            Self::Excellent => "excellent",
        }
    }
}

pub fn get_trust_level(score: i64) -> TrustLevel {
    match score {
        i64::MIN..=20 => TrustLevel::Low,
        21..=40 => TrustLevel::BelowAverage,
        41..=60 => TrustLevel::Average,
        61..=80 => TrustLevel::Good,
        _ => TrustLevel::Excellent,
    }
}

/// How many "equivalent flags" one report from a user with this score counts as.
pub fn get_flag_weight(score: i64) -> f64 {
    match get_trust_level(score) {
        TrustLevel::Low => 0.5,
        TrustLevel::BelowAverage => 0.75,
        TrustLevel::Average => 1.0,
        TrustLevel::Good => 1.25,
        TrustLevel::Excellent => 1.5,
    }
}

/// Whether new comments by this user must be approved before they are published.
///
/// Admins are exempt and the explicit override always applies; only then do the score
/// and comment-history checks run.
pub fn requires_comment_approval(user: &User) -> bool {
    if user.is_global_admin {
        return false;
    }
    if user.requires_comment_approval {
        return true;
    }
    user.trust_score <= APPROVAL_SCORE_THRESHOLD
        || user.approved_comments_count < APPROVAL_MIN_COMMENTS
}

/// Score summary for a single user.
#[derive(Debug, Clone, Serialize)]
pub struct TrustProfile {
    pub user_id: i64,
    pub score: i64,
    pub level: TrustLevel,
    pub flag_weight: f64,
    pub requires_comment_approval: bool,
}

/// Recompute and persist a user's score on the caller's connection.
pub(crate) async fn recalculate_in(
    conn: &mut SqliteConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<i64, ModerationError> {
    let user = users::get(conn, user_id)
        .await?
        .ok_or(ModerationError::NotFound("user"))?;
    let registered_at = user
        .registered_at()
        .ok_or_else(|| ModerationError::InvalidTimestamp {
            user_id,
            raw: user.created_at.clone(),
        })?;
    let has_active_penalty = penalties::find_active(conn, user_id)
        .await?
        .is_some_and(|p| p.is_in_force(now));

    let inputs = TrustInputs {
        days_since_registration: (now - registered_at).num_days(),
        approved_comments_count: user.approved_comments_count,
        flags_submitted_validated: user.flags_submitted_validated,
        valid_flags_received: user.valid_flags_received,
        has_active_penalty,
    };
    let score = calculate(&inputs);
    users::set_trust_score(conn, user_id, score).await?;

    counter!(TRUST_RECALCULATED).increment(1);
    debug!(user_id, previous = user.trust_score, score, "trust score recalculated");
    Ok(score)
}

/// Owner of the `trust_score` column.
#[derive(Clone)]
pub struct TrustScoreEngine {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl TrustScoreEngine {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Recompute the user's score from their counters and penalty state, persist it, and
    /// return it.
    #[tracing::instrument(skip(self))]
    pub async fn recalculate(&self, user_id: i64) -> Result<i64, ModerationError> {
        retry_busy(|| async move {
            let mut tx = self.db.begin().await?;
            let score = recalculate_in(&mut tx, user_id, self.clock.now()).await?;
            tx.commit().await?;
            Ok(score)
        })
        .await
    }

    pub async fn requires_comment_approval(&self, user_id: i64) -> Result<bool, ModerationError> {
        let user = self.user(user_id).await?;
        Ok(requires_comment_approval(&user))
    }

    pub fn get_trust_level(&self, score: i64) -> TrustLevel {
        get_trust_level(score)
    }

    /// The user's persisted score with its derived classifications.
    pub async fn profile(&self, user_id: i64) -> Result<TrustProfile, ModerationError> {
        let user = self.user(user_id).await?;
        Ok(TrustProfile {
            user_id,
            score: user.trust_score,
            level: get_trust_level(user.trust_score),
            flag_weight: get_flag_weight(user.trust_score),
            requires_comment_approval: requires_comment_approval(&user),
        })
    }

    /// One of the user's comments was approved.
    pub async fn record_comment_approved(&self, user_id: i64) -> Result<i64, ModerationError> {
        self.bump(user_id, Counter::ApprovedComments).await
    }

    /// A flag against the user's content was upheld.
    pub async fn record_flag_upheld(&self, user_id: i64) -> Result<i64, ModerationError> {
        self.bump(user_id, Counter::ValidFlagsReceived).await
    }

    /// A report the user filed led to action.
    pub async fn record_report_validated(&self, user_id: i64) -> Result<i64, ModerationError> {
        self.bump(user_id, Counter::FlagsSubmittedValidated).await
    }

    async fn bump(&self, user_id: i64, counter: Counter) -> Result<i64, ModerationError> {
        retry_busy(|| async move {
            let mut tx = self.db.begin().await?;
            if !users::increment(&mut tx, user_id, counter).await? {
                return Err(ModerationError::NotFound("user"));
            }
            let score = recalculate_in(&mut tx, user_id, self.clock.now()).await?;
            tx.commit().await?;
            Ok(score)
        })
        .await
    }

    async fn user(&self, user_id: i64) -> Result<User, ModerationError> {
        let mut conn = self.db.acquire().await?;
        users::get(&mut conn, user_id)
            .await?
            .ok_or(ModerationError::NotFound("user"))
    }
}
