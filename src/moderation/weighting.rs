//! Reporter-weighted flag counts for auto-hide thresholds.

use crate::{
    db::Db,
    error::ModerationError,
    models::ContentType,
    moderation::trust::get_flag_weight,
    store::{flags, users},
};

/// Weight given to flags raised by the system reporter.
const SYSTEM_FLAG_WEIGHT: f64 = 1.0;

#[derive(Clone)]
pub struct FlagWeighting {
    db: Db,
    system_reporter_id: i64,
}

impl FlagWeighting {
    pub fn new(db: Db, system_reporter_id: i64) -> Self {
        Self {
            db,
            system_reporter_id,
        }
    }

    /// How many flags one report from this user counts as.
    pub async fn weight_for(&self, reporter_id: i64) -> Result<f64, ModerationError> {
        if reporter_id == self.system_reporter_id {
            return Ok(SYSTEM_FLAG_WEIGHT);
        }
        let mut conn = self.db.acquire().await?;
        let reporter = users::get(&mut conn, reporter_id)
            .await?
            .ok_or(ModerationError::NotFound("user"))?;
        Ok(get_flag_weight(reporter.trust_score))
    }

    /// Sum of reporter weights over the pending flags on a piece of content, for
    /// comparison against an auto-hide threshold.
    pub async fn weighted_flag_count(
        &self,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<f64, ModerationError> {
        let mut conn = self.db.acquire().await?;
        let reporters = flags::pending_reporters(&mut conn, content_type, content_id).await?;
        Ok(reporters
            .into_iter()
            .map(|(reporter_id, score)| {
                if reporter_id == self.system_reporter_id {
                    SYSTEM_FLAG_WEIGHT
                } else {
                    get_flag_weight(score)
                }
            })
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{clock::Clock as _, tests::TestDb};

    #[tokio::test]
    async fn weights_follow_reporter_trust() {
        let t = TestDb::new().await.unwrap();
        let weighting = &t.moderation.weighting;

        // Fresh accounts sit at 50.
        let average = t.create_user("average", t.clock.now()).await.unwrap();
        assert_eq!(weighting.weight_for(average).await.unwrap(), 1.0);

        let trusted = t
            .create_user("trusted", t.clock.now() - Duration::days(365))
            .await
            .unwrap();
        for _ in 0..5 {
            _ = t.moderation.trust.record_report_validated(trusted).await.unwrap();
        }
        // 50 + 20 + 10 = 80.
        assert_eq!(weighting.weight_for(trusted).await.unwrap(), 1.25);

        let flagged = t.create_user("flagged", t.clock.now()).await.unwrap();
        for _ in 0..3 {
            _ = t.moderation.trust.record_flag_upheld(flagged).await.unwrap();
        }
        // 50 - 30 = 20.
        assert_eq!(weighting.weight_for(flagged).await.unwrap(), 0.5);

        assert_eq!(weighting.weight_for(t.system_user).await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn pending_flags_are_summed_by_weight() {
        let t = TestDb::new().await.unwrap();
        let author = t.create_user("author", t.clock.now()).await.unwrap();
        let idea = t.create_idea(author, "approved").await.unwrap();

        let average = t.create_user("average", t.clock.now()).await.unwrap();
        let flagged = t.create_user("flagged", t.clock.now()).await.unwrap();
        for _ in 0..3 {
            _ = t.moderation.trust.record_flag_upheld(flagged).await.unwrap();
        }

        t.create_flag(ContentType::Idea, idea, average).await.unwrap();
        t.create_flag(ContentType::Idea, idea, flagged).await.unwrap();
        t.create_flag(ContentType::Idea, idea, t.system_user).await.unwrap();
        // A flag on some other content does not count.
        t.create_flag(ContentType::Comment, idea, average).await.unwrap();

        let total = t
            .moderation
            .weighting
            .weighted_flag_count(ContentType::Idea, idea)
            .await
            .unwrap();
        assert_eq!(total, 2.5);
    }
}
