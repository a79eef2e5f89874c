//! Pre-publication gate for content creation.

use serde::Serialize;

use crate::{error::ModerationError, moderation::trust::TrustScoreEngine};

/// What a content-creation call site should do with a new idea or comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Admission {
    /// Publish immediately.
    Publish,
    /// Store hidden/pending and answer with an "accepted, awaiting review" signal.
    HoldForApproval,
}

#[derive(Clone)]
pub struct ModerationGate {
    trust: TrustScoreEngine,
}

impl ModerationGate {
    pub fn new(trust: TrustScoreEngine) -> Self {
        Self { trust }
    }

    pub async fn requires_comment_approval(&self, user_id: i64) -> Result<bool, ModerationError> {
        self.trust.requires_comment_approval(user_id).await
    }

    pub async fn admission(&self, user_id: i64) -> Result<Admission, ModerationError> {
        Ok(if self.requires_comment_approval(user_id).await? {
            Admission::HoldForApproval
        } else {
            Admission::Publish
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{clock::Clock as _, tests::TestDb};

    #[tokio::test]
    async fn newcomers_are_held() {
        let t = TestDb::new().await.unwrap();
        let user = t.create_user("newcomer", t.clock.now()).await.unwrap();
        assert_eq!(
            t.moderation.gate.admission(user).await.unwrap(),
            Admission::HoldForApproval
        );
    }

    #[tokio::test]
    async fn established_users_publish_and_admins_always_do() {
        let t = TestDb::new().await.unwrap();
        let user = t
            .create_user("regular", t.clock.now() - Duration::days(30))
            .await
            .unwrap();
        for _ in 0..5 {
            _ = t.moderation.trust.record_comment_approved(user).await.unwrap();
        }
        assert_eq!(
            t.moderation.gate.admission(user).await.unwrap(),
            Admission::Publish
        );

        let admin = t.create_admin("admin").await.unwrap();
        assert!(!t.moderation.gate.requires_comment_approval(admin).await.unwrap());
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let t = TestDb::new().await.unwrap();
        assert!(matches!(
            t.moderation.gate.admission(31337).await,
            Err(ModerationError::NotFound("user"))
        ));
    }
}
