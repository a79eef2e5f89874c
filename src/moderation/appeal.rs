//! Appeals: one per penalty, reviewed once.

use std::{str::FromStr, sync::Arc};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    clock::Clock,
    db::{Db, is_unique_violation, retry_busy},
    error::ModerationError,
    metrics::{APPEAL_REVIEWED, APPEAL_SUBMITTED},
    models::{Appeal, AppealStatus, PenaltyStatus},
    moderation::penalty::{can_appeal, reinstate_in, revoke_in},
    store::{appeals, penalties},
};

/// An administrator's decision on a pending appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Approve,
    Reject,
}

impl FromStr for ReviewAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(ModerationError::InvalidAction(format!(
                "unknown review action {other:?}; expected \"approve\" or \"reject\""
            ))),
        }
    }
}

#[derive(Clone)]
pub struct AppealWorkflow {
    db: Db,
    clock: Arc<dyn Clock>,
}

impl AppealWorkflow {
    pub fn new(db: Db, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Contest a penalty. The penalty is suspended (APPEALED) until the appeal is reviewed.
    ///
    /// A penalty owned by someone else is reported as missing.
    #[tracing::instrument(skip(self, reason))]
    pub async fn submit_appeal(
        &self,
        penalty_id: i64,
        user_id: i64,
        reason: &str,
    ) -> Result<Appeal, ModerationError> {
        let appeal = retry_busy(|| async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;

            let penalty = penalties::get(&mut tx, penalty_id)
                .await?
                .filter(|p| p.user_id == user_id)
                .ok_or(ModerationError::NotFound("penalty"))?;
            let has_appeal = appeals::exists_for_penalty(&mut tx, penalty_id).await?;
            if has_appeal {
                return Err(ModerationError::AlreadyExists(
                    "an appeal has already been submitted for this penalty",
                ));
            }
            if !can_appeal(&penalty, has_appeal, now) {
                return Err(ModerationError::CannotAppeal(
                    "this penalty cannot be appealed: warnings and penalties that are no longer in force are not eligible",
                ));
            }

            let appeal = appeals::insert(&mut tx, penalty_id, user_id, reason, now)
                .await
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        ModerationError::AlreadyExists(
                            "an appeal has already been submitted for this penalty",
                        )
                    } else {
                        err.into()
                    }
                })?;
            _ = penalties::set_status(&mut tx, penalty_id, PenaltyStatus::Appealed).await?;
            tx.commit().await?;
            Ok(appeal)
        })
        .await?;

        counter!(APPEAL_SUBMITTED).increment(1);
        info!(appeal_id = appeal.id, "appeal submitted");
        Ok(appeal)
    }

    /// Resolve a pending appeal. Approval revokes the penalty and recomputes the user's
    /// score; rejection puts the penalty back in force.
    ///
    /// Appeals that were already reviewed are reported as missing.
    #[tracing::instrument(skip(self, notes))]
    pub async fn review_appeal(
        &self,
        appeal_id: i64,
        reviewer_id: i64,
        action: ReviewAction,
        notes: &str,
    ) -> Result<Appeal, ModerationError> {
        let appeal = retry_busy(|| async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;

            let appeal = appeals::get_pending(&mut tx, appeal_id)
                .await?
                .ok_or(ModerationError::NotFound("appeal"))?;
            let penalty = penalties::get(&mut tx, appeal.penalty_id)
                .await?
                .ok_or(ModerationError::NotFound("penalty"))?;

            let status = match action {
                ReviewAction::Approve => {
                    let reason = format!("Appeal approved: {notes}");
                    _ = revoke_in(&mut tx, &penalty, reviewer_id, &reason, now).await?;
                    AppealStatus::Approved
                }
                ReviewAction::Reject => {
                    // The score still carries the penalty from issuance.
                    _ = reinstate_in(&mut tx, &penalty).await?;
                    AppealStatus::Rejected
                }
            };

            let appeal = appeals::resolve(&mut tx, appeal_id, status, reviewer_id, now, notes).await?;
            tx.commit().await?;
            Ok(appeal)
        })
        .await?;

        let outcome = match appeal.status {
            AppealStatus::Approved => "approved",
            AppealStatus::Rejected => "rejected",
            AppealStatus::Pending => "pending",
        };
        counter!(APPEAL_REVIEWED, "outcome" => outcome).increment(1);
        info!(penalty_id = appeal.penalty_id, outcome, "appeal reviewed");
        Ok(appeal)
    }

    pub async fn get_appeal(&self, appeal_id: i64) -> Result<Appeal, ModerationError> {
        let mut conn = self.db.acquire().await?;
        appeals::get(&mut conn, appeal_id)
            .await?
            .ok_or(ModerationError::NotFound("appeal"))
    }

    /// The review queue, oldest first.
    pub async fn list_pending_appeals(&self) -> Result<Vec<Appeal>, ModerationError> {
        let mut conn = self.db.acquire().await?;
        Ok(appeals::list_pending(&mut conn).await?)
    }

    pub async fn list_user_appeals(&self, user_id: i64) -> Result<Vec<Appeal>, ModerationError> {
        let mut conn = self.db.acquire().await?;
        Ok(appeals::list_for_user(&mut conn, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        models::{Penalty, PenaltyType},
        moderation::penalty::PenaltyRequest,
        tests::TestDb,
    };

    async fn banned(ty: PenaltyType) -> (TestDb, i64, i64, Penalty) {
        let t = TestDb::new().await.unwrap();
        let admin = t.create_admin("admin").await.unwrap();
        let user = t.create_user("appellant", t.clock.now()).await.unwrap();
        let penalty = t
            .moderation
            .ledger
            .issue_penalty(PenaltyRequest::new(user, ty, "spam", admin))
            .await
            .unwrap();
        (t, admin, user, penalty)
    }

    #[test]
    fn review_actions_parse() {
        assert_eq!("approve".parse::<ReviewAction>().unwrap(), ReviewAction::Approve);
        assert_eq!("reject".parse::<ReviewAction>().unwrap(), ReviewAction::Reject);
        assert!(matches!(
            "escalate".parse::<ReviewAction>(),
            Err(ModerationError::InvalidAction(_))
        ));
    }

    #[tokio::test]
    async fn submit_suspends_the_penalty() {
        let (t, _, user, penalty) = banned(PenaltyType::TempBan7d).await;

        let appeal = t
            .moderation
            .appeals
            .submit_appeal(penalty.id, user, "it was a joke")
            .await
            .unwrap();
        assert_eq!(appeal.status, AppealStatus::Pending);
        assert_eq!(appeal.penalty_id, penalty.id);

        let penalty = t.moderation.ledger.get_penalty(penalty.id).await.unwrap();
        assert_eq!(penalty.status, PenaltyStatus::Appealed);
        assert!(t.moderation.ledger.check_user_banned(user).await.unwrap().is_none());
        assert_eq!(
            t.moderation.appeals.list_pending_appeals().await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn someone_elses_penalty_is_not_found() {
        let (t, _, _, penalty) = banned(PenaltyType::TempBan7d).await;
        let stranger = t.create_user("stranger", t.clock.now()).await.unwrap();

        let err = t
            .moderation
            .appeals
            .submit_appeal(penalty.id, stranger, "let them go")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound("penalty")));

        let err = t
            .moderation
            .appeals
            .submit_appeal(9999, stranger, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound("penalty")));
    }

    #[tokio::test]
    async fn second_submission_already_exists() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan24h).await;
        let appeals = &t.moderation.appeals;

        let appeal = appeals.submit_appeal(penalty.id, user, "first").await.unwrap();
        let err = appeals.submit_appeal(penalty.id, user, "second").await.unwrap_err();
        assert!(matches!(err, ModerationError::AlreadyExists(_)));

        // Still refused once the first appeal has been decided either way.
        _ = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Reject, "no")
            .await
            .unwrap();
        let err = appeals.submit_appeal(penalty.id, user, "third").await.unwrap_err();
        assert!(matches!(err, ModerationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn approved_appeal_is_not_resubmittable() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan7d).await;
        let appeals = &t.moderation.appeals;

        let appeal = appeals.submit_appeal(penalty.id, user, "first").await.unwrap();
        _ = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Approve, "granted")
            .await
            .unwrap();

        let err = appeals.submit_appeal(penalty.id, user, "again").await.unwrap_err();
        assert!(matches!(err, ModerationError::AlreadyExists(_)));
        assert_eq!(appeals.list_user_appeals(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn warnings_cannot_be_appealed() {
        let (t, _, user, warning) = banned(PenaltyType::Warning).await;
        let err = t
            .moderation
            .appeals
            .submit_appeal(warning.id, user, "unfair")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::CannotAppeal(_)));
        assert!(!t.moderation.ledger.can_appeal(&warning).await.unwrap());
    }

    #[tokio::test]
    async fn revoked_penalties_cannot_be_appealed() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan7d).await;
        let revoked = t
            .moderation
            .ledger
            .revoke_penalty(penalty.id, admin, "mistake")
            .await
            .unwrap();
        assert!(!t.moderation.ledger.can_appeal(&revoked).await.unwrap());

        let err = t
            .moderation
            .appeals
            .submit_appeal(penalty.id, user, "already gone")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::CannotAppeal(_)));
    }

    #[tokio::test]
    async fn served_bans_cannot_be_appealed() {
        let (t, _, user, penalty) = banned(PenaltyType::TempBan24h).await;

        // Elapsed, but the sweep has not run yet.
        t.clock.advance(Duration::hours(30));
        assert!(t.moderation.ledger.check_user_banned(user).await.unwrap().is_none());
        assert!(!t.moderation.ledger.can_appeal(&penalty).await.unwrap());

        let err = t
            .moderation
            .appeals
            .submit_appeal(penalty.id, user, "too late")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::CannotAppeal(_)));

        // The served ban is left for the sweep and still counts toward escalation.
        assert_eq!(t.moderation.ledger.expire_old_penalties().await.unwrap(), 1);
        assert_eq!(
            t.moderation.ledger.get_penalty(penalty.id).await.unwrap().status,
            PenaltyStatus::Expired
        );
        assert_eq!(
            t.moderation.ledger.get_next_penalty_type(user).await.unwrap(),
            PenaltyType::TempBan7d
        );
        assert!(t.moderation.appeals.list_user_appeals(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_reinstates_the_penalty() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan7d).await;
        let appeals = &t.moderation.appeals;
        let appeal = appeals.submit_appeal(penalty.id, user, "sorry").await.unwrap();

        let reviewed = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Reject, "stands")
            .await
            .unwrap();
        assert_eq!(reviewed.status, AppealStatus::Rejected);
        assert_eq!(reviewed.reviewed_by, Some(admin));
        assert_eq!(reviewed.reviewed_at, Some(t.clock.now()));
        assert_eq!(reviewed.review_notes.as_deref(), Some("stands"));

        let penalty = t.moderation.ledger.get_penalty(penalty.id).await.unwrap();
        assert_eq!(penalty.status, PenaltyStatus::Active);
        assert!(t.moderation.ledger.check_user_banned(user).await.unwrap().is_some());
        assert_eq!(t.moderation.trust.profile(user).await.unwrap().score, 30);
    }

    #[tokio::test]
    async fn approval_revokes_and_restores_score() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan30d).await;
        let appeals = &t.moderation.appeals;
        assert_eq!(t.moderation.trust.profile(user).await.unwrap().score, 30);
        let appeal = appeals.submit_appeal(penalty.id, user, "wrong person").await.unwrap();

        let reviewed = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Approve, "confirmed")
            .await
            .unwrap();
        assert_eq!(reviewed.status, AppealStatus::Approved);

        let penalty = t.moderation.ledger.get_penalty(penalty.id).await.unwrap();
        assert_eq!(penalty.status, PenaltyStatus::Revoked);
        assert_eq!(penalty.revoked_by, Some(admin));
        assert_eq!(
            penalty.revoke_reason.as_deref(),
            Some("Appeal approved: confirmed")
        );
        assert!(t.moderation.ledger.check_user_banned(user).await.unwrap().is_none());
        assert_eq!(t.moderation.trust.profile(user).await.unwrap().score, 50);
    }

    #[tokio::test]
    async fn reviewed_appeals_cannot_be_reviewed_again() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan7d).await;
        let appeals = &t.moderation.appeals;
        let appeal = appeals.submit_appeal(penalty.id, user, "please").await.unwrap();
        _ = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Approve, "ok")
            .await
            .unwrap();

        let err = appeals
            .review_appeal(appeal.id, admin, ReviewAction::Reject, "changed my mind")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound("appeal")));
        assert_eq!(
            appeals.get_appeal(appeal.id).await.unwrap().status,
            AppealStatus::Approved
        );
        assert!(appeals.list_pending_appeals().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_defers_to_a_stronger_active_penalty() {
        let (t, admin, user, penalty) = banned(PenaltyType::TempBan24h).await;
        let appeal = t
            .moderation
            .appeals
            .submit_appeal(penalty.id, user, "sorry")
            .await
            .unwrap();

        // Issued while the first penalty was suspended.
        let stronger = t
            .moderation
            .ledger
            .issue_penalty(PenaltyRequest::new(user, PenaltyType::TempBan30d, "again", admin))
            .await
            .unwrap();

        _ = t
            .moderation
            .appeals
            .review_appeal(appeal.id, admin, ReviewAction::Reject, "no")
            .await
            .unwrap();

        let ledger = &t.moderation.ledger;
        assert_eq!(
            ledger.get_penalty(penalty.id).await.unwrap().status,
            PenaltyStatus::Expired
        );
        assert_eq!(
            ledger.get_active_penalty(user).await.unwrap().map(|p| p.id),
            Some(stronger.id)
        );
        assert_eq!(t.moderation.appeals.list_user_appeals(user).await.unwrap().len(), 1);
    }
}
