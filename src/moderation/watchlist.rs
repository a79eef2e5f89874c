//! Keyword watchlist: raises automatic flags on matching content.

use std::sync::Arc;

use metrics::counter;
use regex::RegexBuilder;
use tracing::{info, warn};

use crate::{
    clock::Clock,
    db::{Db, retry_busy},
    error::ModerationError,
    metrics::WATCHLIST_MATCHES,
    models::{ContentFlag, ContentType, KeywordWatch},
    store::{
        flags::{self, NewFlag},
        watchlist,
    },
};

/// Case-insensitive test of one watchlist entry against content.
///
/// Returns `None` when a regex entry does not compile; callers skip such entries.
fn keyword_matches(entry: &KeywordWatch, content: &str, content_lower: &str) -> Option<bool> {
    if entry.is_regex {
        match RegexBuilder::new(&entry.keyword).case_insensitive(true).build() {
            Ok(re) => Some(re.is_match(content)),
            Err(err) => {
                warn!(keyword_id = entry.id, pattern = %entry.keyword, %err, "skipping invalid watchlist pattern");
                None
            }
        }
    } else {
        Some(content_lower.contains(&entry.keyword.to_lowercase()))
    }
}

#[derive(Clone)]
pub struct WatchlistMatcher {
    db: Db,
    clock: Arc<dyn Clock>,
    system_reporter_id: i64,
}

impl WatchlistMatcher {
    pub fn new(db: Db, clock: Arc<dyn Clock>, system_reporter_id: i64) -> Self {
        Self {
            db,
            clock,
            system_reporter_id,
        }
    }

    /// Flag the content once for every active keyword it matches, on behalf of the system
    /// reporter. All flags are committed together.
    #[tracing::instrument(skip(self, content))]
    pub async fn check_content_for_keywords(
        &self,
        content: &str,
        content_type: ContentType,
        content_id: i64,
    ) -> Result<Vec<ContentFlag>, ModerationError> {
        let content_lower = content.to_lowercase();
        let content_lower = content_lower.as_str();

        let created = retry_busy(|| async move {
            let now = self.clock.now();
            let mut tx = self.db.begin().await?;
            let mut created = Vec::new();

            for entry in watchlist::list_active(&mut tx).await? {
                if keyword_matches(&entry, content, content_lower) != Some(true) {
                    continue;
                }

                let details = format!("Matched watchlist keyword: {}", entry.keyword);
                let flag = flags::insert(
                    &mut tx,
                    &NewFlag {
                        content_type,
                        content_id,
                        reporter_id: self.system_reporter_id,
                        reason: &entry.auto_flag_reason,
                        details: Some(&details),
                        created_at: now,
                    },
                )
                .await?;
                watchlist::record_match(&mut tx, entry.id).await?;
                created.push(flag);
            }

            tx.commit().await?;
            Ok(created)
        })
        .await?;

        if !created.is_empty() {
            counter!(WATCHLIST_MATCHES).increment(created.len() as u64);
            info!(flags = created.len(), "content auto-flagged by watchlist");
        }
        Ok(created)
    }

    /// Add a watchlist entry. Regex entries must compile.
    pub async fn add_keyword(
        &self,
        keyword: &str,
        is_regex: bool,
        auto_flag_reason: &str,
    ) -> Result<KeywordWatch, ModerationError> {
        if keyword.trim().is_empty() {
            return Err(ModerationError::InvalidAction(
                "watchlist keyword must not be empty".to_owned(),
            ));
        }
        if is_regex {
            if let Err(err) = RegexBuilder::new(keyword).case_insensitive(true).build() {
                return Err(ModerationError::InvalidAction(format!(
                    "invalid watchlist pattern: {err}"
                )));
            }
        }

        let mut conn = self.db.acquire().await?;
        let entry = watchlist::insert(&mut conn, keyword, is_regex, auto_flag_reason, self.clock.now())
            .await?;
        info!(keyword_id = entry.id, is_regex, "watchlist keyword added");
        Ok(entry)
    }

    pub async fn set_keyword_active(
        &self,
        keyword_id: i64,
        is_active: bool,
    ) -> Result<KeywordWatch, ModerationError> {
        let mut conn = self.db.acquire().await?;
        watchlist::set_active(&mut conn, keyword_id, is_active)
            .await?
            .ok_or(ModerationError::NotFound("watchlist keyword"))
    }

    pub async fn list_keywords(&self) -> Result<Vec<KeywordWatch>, ModerationError> {
        let mut conn = self.db.acquire().await?;
        Ok(watchlist::list(&mut conn).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::FlagStatus, tests::TestDb};

    #[tokio::test]
    async fn bad_regex_is_skipped_not_raised() {
        let t = TestDb::new().await.unwrap();
        // Written directly: `add_keyword` would refuse the broken pattern.
        t.insert_raw_keyword("(unclosed", true, "spam").await.unwrap();
        let good = t
            .moderation
            .watchlist
            .add_keyword("Free Money", false, "spam")
            .await
            .unwrap();

        let flags = t
            .moderation
            .watchlist
            .check_content_for_keywords("Get FREE MONEY now!", ContentType::Comment, 12)
            .await
            .unwrap();

        assert_eq!(flags.len(), 1);
        let flag = &flags[0];
        assert_eq!(flag.reporter_id, t.system_user);
        assert_eq!(flag.reason, "spam");
        assert_eq!(flag.status, FlagStatus::Pending);
        assert_eq!(flag.content_type, ContentType::Comment);
        assert_eq!(flag.content_id, 12);
        assert!(flag.details.as_deref().unwrap().contains("Free Money"));

        let keywords = t.moderation.watchlist.list_keywords().await.unwrap();
        let good = keywords.iter().find(|k| k.id == good.id).unwrap();
        assert_eq!(good.match_count, 1);
    }

    #[tokio::test]
    async fn regexes_match_case_insensitively() {
        let t = TestDb::new().await.unwrap();
        let watchlist = &t.moderation.watchlist;
        _ = watchlist
            .add_keyword(r"\bcasino\s+bonus\b", true, "gambling")
            .await
            .unwrap();
        _ = watchlist.add_keyword("crypto", false, "scam").await.unwrap();

        let flags = watchlist
            .check_content_for_keywords("Best CASINO   Bonus and Crypto tips", ContentType::Idea, 3)
            .await
            .unwrap();
        let mut reasons: Vec<_> = flags.iter().map(|f| f.reason.as_str()).collect();
        reasons.sort_unstable();
        assert_eq!(reasons, ["gambling", "scam"]);

        let flags = watchlist
            .check_content_for_keywords("A perfectly civil proposal", ContentType::Idea, 4)
            .await
            .unwrap();
        assert!(flags.is_empty());
    }

    #[tokio::test]
    async fn inactive_keywords_do_not_match() {
        let t = TestDb::new().await.unwrap();
        let watchlist = &t.moderation.watchlist;
        let entry = watchlist.add_keyword("spam", false, "spam").await.unwrap();
        let entry = watchlist.set_keyword_active(entry.id, false).await.unwrap();
        assert!(!entry.is_active);

        let flags = watchlist
            .check_content_for_keywords("spam spam spam", ContentType::Comment, 1)
            .await
            .unwrap();
        assert!(flags.is_empty());

        assert!(matches!(
            watchlist.set_keyword_active(777, true).await,
            Err(ModerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn invalid_patterns_are_refused_on_insert() {
        let t = TestDb::new().await.unwrap();
        let err = t
            .moderation
            .watchlist
            .add_keyword("[a-", true, "spam")
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::InvalidAction(_)));
        assert!(t.moderation.watchlist.list_keywords().await.unwrap().is_empty());
    }
}
