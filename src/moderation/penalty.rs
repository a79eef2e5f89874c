//! The penalty ledger: issuance, escalation, revocation and expiry.
//!
//! A user has at most one ACTIVE penalty. The ledger checks this inside the issuing
//! transaction after taking the user's write lock, and the `idx_penalty_one_active` partial
//! unique index backs it at the storage layer. SQLite admits one writer at a time, so
//! concurrent issuers for the same user run one after the other; a writer that loses the
//! race sees busy/snapshot errors and re-runs from the start via [`retry_busy`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use sqlx::SqliteConnection;
use tracing::{info, warn};

use crate::{
    clock::Clock,
    db::{Db, is_unique_violation, retry_busy},
    error::ModerationError,
    metrics::{PENALTY_EXPIRED, PENALTY_ISSUED, PENALTY_REVOKED},
    models::{Penalty, PenaltyStatus, PenaltyType},
    moderation::trust::recalculate_in,
    store::{
        appeals, content,
        penalties::{self, NewPenalty},
        users,
    },
};

/// Arguments to [`PenaltyLedger::issue_penalty`].
#[derive(Debug, Clone, Deserialize)]
pub struct PenaltyRequest {
    pub user_id: i64,
    pub penalty_type: PenaltyType,
    pub reason: String,
    pub issued_by: i64,
    #[serde(default)]
    pub related_flag_ids: Vec<i64>,
    /// Soft-delete the user's unapproved ideas and comments. Ignored for warnings.
    #[serde(default)]
    pub bulk_delete_content: bool,
}

impl PenaltyRequest {
    pub fn new(user_id: i64, penalty_type: PenaltyType, reason: &str, issued_by: i64) -> Self {
        Self {
            user_id,
            penalty_type,
            reason: reason.to_owned(),
            issued_by,
            related_flag_ids: Vec::new(),
            bulk_delete_content: false,
        }
    }
}

/// A penalty may be appealed once, while it is in force, unless it is only a warning.
/// A timed ban that has run out is served, even before the sweep marks it EXPIRED.
pub fn can_appeal(penalty: &Penalty, has_appeal: bool, now: DateTime<Utc>) -> bool {
    let eligible_type = match penalty.penalty_type {
        PenaltyType::Warning => false,
        PenaltyType::TempBan24h
        | PenaltyType::TempBan7d
        | PenaltyType::TempBan30d
        | PenaltyType::PermanentBan => true,
    };
    penalty.is_in_force(now) && !has_appeal && eligible_type
}

/// Pick the penalty for a repeat offender from their (newest-first) history.
///
/// Severity levels are walked from the second-highest down; the first level with a
/// penalty inside its own lookback window decides, and the result is one step above it.
/// Revoked penalties were overturned and do not count.
pub fn next_penalty_type(history: &[Penalty], now: DateTime<Utc>) -> PenaltyType {
    PenaltyType::ALL
        .iter()
        .rev()
        .skip(1)
        .find(|level| {
            let cutoff = now - level.lookback();
            history.iter().any(|p| {
                p.penalty_type == **level
                    && p.status != PenaltyStatus::Revoked
                    && p.issued_at >= cutoff
            })
        })
        .map_or(PenaltyType::Warning, |level| level.escalate())
}

/// Owner of penalty rows.
#[derive(Clone)]
pub struct PenaltyLedger {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl PenaltyLedger {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Issue a penalty. An existing ACTIVE penalty must be strictly less severe; it is
    /// superseded (moved to EXPIRED) by the new one.
    #[tracing::instrument(skip_all, fields(user_id = request.user_id, penalty_type = %request.penalty_type))]
    pub async fn issue_penalty(&self, request: PenaltyRequest) -> Result<Penalty, ModerationError> {
        let request = &request;
        let penalty = retry_busy(|| async move { self.issue_once(request).await }).await?;

        counter!(PENALTY_ISSUED, "type" => penalty.penalty_type.as_str()).increment(1);
        info!(
            penalty_id = penalty.id,
            issued_by = penalty.issued_by,
            expires_at = ?penalty.expires_at,
            "penalty issued"
        );
        Ok(penalty)
    }

    async fn issue_once(&self, request: &PenaltyRequest) -> Result<Penalty, ModerationError> {
        let now = self.clock.now();
        let mut tx = self.db.begin().await?;

        if !users::lock(&mut tx, request.user_id).await? {
            return Err(ModerationError::NotFound("user"));
        }
        expire_elapsed_for_user(&mut tx, request.user_id, now).await?;

        if let Some(active) = penalties::find_active(&mut tx, request.user_id).await? {
            if active.penalty_type.severity() >= request.penalty_type.severity() {
                return Err(ModerationError::AlreadyPenalized {
                    active: active.penalty_type,
                });
            }
            _ = penalties::set_status(&mut tx, active.id, PenaltyStatus::Expired).await?;
            counter!(PENALTY_EXPIRED).increment(1);
            info!(
                superseded = active.id,
                previous = %active.penalty_type,
                "escalating over active penalty"
            );
        }

        let penalty = penalties::insert(
            &mut tx,
            &NewPenalty {
                user_id: request.user_id,
                penalty_type: request.penalty_type,
                reason: &request.reason,
                issued_by: request.issued_by,
                issued_at: now,
                expires_at: request.penalty_type.duration().map(|d| now + d),
                related_flag_ids: &request.related_flag_ids,
            },
        )
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                ModerationError::AlreadyPenalized {
                    active: request.penalty_type,
                }
            } else {
                err.into()
            }
        })?;

        if request.bulk_delete_content && request.penalty_type != PenaltyType::Warning {
            let reason = format!("user banned: {}", request.reason);
            let (ideas, comments) =
                content::soft_delete_pending(&mut tx, request.user_id, &reason, now).await?;
            info!(ideas, comments, "removed pending content of banned user");
        }

        _ = recalculate_in(&mut tx, request.user_id, now).await?;
        tx.commit().await?;
        Ok(penalty)
    }

    /// The penalty a new offence by this user should receive.
    pub async fn get_next_penalty_type(&self, user_id: i64) -> Result<PenaltyType, ModerationError> {
        let mut conn = self.db.acquire().await?;
        let history = penalties::list_for_user(&mut conn, user_id).await?;
        Ok(next_penalty_type(&history, self.clock.now()))
    }

    /// The user's ACTIVE, unelapsed penalty, warnings included.
    pub async fn get_active_penalty(&self, user_id: i64) -> Result<Option<Penalty>, ModerationError> {
        let mut conn = self.db.acquire().await?;
        let now = self.clock.now();
        Ok(penalties::find_active(&mut conn, user_id)
            .await?
            .filter(|p| p.is_in_force(now)))
    }

    /// The user's current ban, if any. Warnings are recorded but never bar access.
    pub async fn check_user_banned(&self, user_id: i64) -> Result<Option<Penalty>, ModerationError> {
        Ok(self
            .get_active_penalty(user_id)
            .await?
            .filter(|p| match p.penalty_type {
                PenaltyType::Warning => false,
                PenaltyType::TempBan24h
                | PenaltyType::TempBan7d
                | PenaltyType::TempBan30d
                | PenaltyType::PermanentBan => true,
            }))
    }

    pub async fn get_penalty(&self, penalty_id: i64) -> Result<Penalty, ModerationError> {
        let mut conn = self.db.acquire().await?;
        penalties::get(&mut conn, penalty_id)
            .await?
            .ok_or(ModerationError::NotFound("penalty"))
    }

    /// The user's penalty history, newest first.
    pub async fn list_user_penalties(&self, user_id: i64) -> Result<Vec<Penalty>, ModerationError> {
        let mut conn = self.db.acquire().await?;
        Ok(penalties::list_for_user(&mut conn, user_id).await?)
    }

    /// Revoke an ACTIVE penalty and recompute the user's score.
    #[tracing::instrument(skip(self, reason))]
    pub async fn revoke_penalty(
        &self,
        penalty_id: i64,
        revoked_by: i64,
        reason: &str,
    ) -> Result<Penalty, ModerationError> {
        let penalty = retry_busy(|| async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;
            let penalty = penalties::get(&mut tx, penalty_id)
                .await?
                .ok_or(ModerationError::NotFound("penalty"))?;
            if penalty.status != PenaltyStatus::Active {
                return Err(ModerationError::CannotRevoke(format!(
                    "only active penalties can be revoked; penalty {penalty_id} is {:?}",
                    penalty.status
                )));
            }

            let penalty = revoke_in(&mut tx, &penalty, revoked_by, reason, now).await?;
            tx.commit().await?;
            Ok(penalty)
        })
        .await?;

        info!(user_id = penalty.user_id, "penalty revoked");
        Ok(penalty)
    }

    /// Move every ACTIVE penalty whose time is up to EXPIRED. Scores are left alone; they
    /// catch up at the user's next recalculation.
    #[tracing::instrument(skip(self))]
    pub async fn expire_old_penalties(&self) -> Result<u64, ModerationError> {
        let expired = retry_busy(|| async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;
            let due: Vec<Penalty> = penalties::list_active_timed(&mut tx)
                .await?
                .into_iter()
                .filter(|p| p.has_elapsed(now))
                .collect();
            for penalty in &due {
                _ = penalties::set_status(&mut tx, penalty.id, PenaltyStatus::Expired).await?;
            }
            tx.commit().await?;
            Ok(due.len() as u64)
        })
        .await?;

        if expired > 0 {
            counter!(PENALTY_EXPIRED).increment(expired);
            info!(expired, "expired elapsed penalties");
        }
        Ok(expired)
    }

    /// Whether the penalty can be appealed right now.
    pub async fn can_appeal(&self, penalty: &Penalty) -> Result<bool, ModerationError> {
        let mut conn = self.db.acquire().await?;
        let has_appeal = appeals::exists_for_penalty(&mut conn, penalty.id).await?;
        Ok(can_appeal(penalty, has_appeal, self.clock.now()))
    }
}

/// Revoke on the caller's connection and recompute the owner's score. Status
/// preconditions are the caller's business: admins revoke ACTIVE penalties, approved
/// appeals revoke APPEALED ones.
pub(crate) async fn revoke_in(
    conn: &mut SqliteConnection,
    penalty: &Penalty,
    revoked_by: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Penalty, ModerationError> {
    let revoked = penalties::mark_revoked(conn, penalty.id, revoked_by, now, reason).await?;
    _ = recalculate_in(conn, penalty.user_id, now).await?;
    counter!(PENALTY_REVOKED).increment(1);
    Ok(revoked)
}

/// Lazily expire the user's elapsed ACTIVE penalty so it does not block a new one.
async fn expire_elapsed_for_user(
    conn: &mut SqliteConnection,
    user_id: i64,
    now: DateTime<Utc>,
) -> Result<(), ModerationError> {
    if let Some(active) = penalties::find_active(conn, user_id).await? {
        if active.has_elapsed(now) {
            _ = penalties::set_status(conn, active.id, PenaltyStatus::Expired).await?;
            counter!(PENALTY_EXPIRED).increment(1);
        }
    }
    Ok(())
}

/// Put an APPEALED penalty back in force after its appeal was rejected.
///
/// If the user picked up another ACTIVE penalty meanwhile, the more severe of the two
/// stays ACTIVE and the other is superseded.
pub(crate) async fn reinstate_in(
    conn: &mut SqliteConnection,
    penalty: &Penalty,
) -> Result<Penalty, ModerationError> {
    if let Some(other) = penalties::find_active(conn, penalty.user_id).await? {
        if other.penalty_type.severity() >= penalty.penalty_type.severity() {
            warn!(
                penalty_id = penalty.id,
                superseded_by = other.id,
                "rejected appeal; a stronger penalty is already active"
            );
            return Ok(penalties::set_status(conn, penalty.id, PenaltyStatus::Expired).await?);
        }
        _ = penalties::set_status(conn, other.id, PenaltyStatus::Expired).await?;
    }
    Ok(penalties::set_status(conn, penalty.id, PenaltyStatus::Active).await?)
}
