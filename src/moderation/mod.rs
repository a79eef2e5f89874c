//! Moderation services: trust scores, the penalty ledger, appeals, the comment gate,
//! flag weighting and the keyword watchlist.

use std::sync::Arc;

use crate::{clock::Clock, db::Db};

pub mod appeal;
pub mod gate;
pub mod penalty;
pub mod trust;
pub mod watchlist;
pub mod weighting;

pub use appeal::{AppealWorkflow, ReviewAction};
pub use gate::{Admission, ModerationGate};
pub use penalty::{PenaltyLedger, PenaltyRequest};
pub use trust::{TrustLevel, TrustProfile, TrustScoreEngine};
pub use watchlist::WatchlistMatcher;
pub use weighting::FlagWeighting;

/// Every moderation service, sharing one pool and one clock.
#[derive(Clone)]
pub struct Moderation {
    pub trust: TrustScoreEngine,
    pub ledger: PenaltyLedger,
    pub appeals: AppealWorkflow,
    pub gate: ModerationGate,
    pub weighting: FlagWeighting,
    pub watchlist: WatchlistMatcher,
}

impl Moderation {
    /// `system_user_id` is the reporter recorded on automatic flags.
    pub fn new(db: Db, clock: Arc<dyn Clock>, system_user_id: i64) -> Self {
        let trust = TrustScoreEngine::new(db.clone(), clock.clone());
        Self {
            ledger: PenaltyLedger::new(db.clone(), clock.clone()),
            appeals: AppealWorkflow::new(db.clone(), clock.clone()),
            gate: ModerationGate::new(trust.clone()),
            weighting: FlagWeighting::new(db.clone(), system_user_id),
            watchlist: WatchlistMatcher::new(db, clock, system_user_id),
            trust,
        }
    }
}
