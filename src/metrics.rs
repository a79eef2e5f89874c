//! Metric names and exporter setup.

use std::time::Duration;

use anyhow::Context;
use metrics::describe_counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config;

pub const PENALTY_ISSUED: &str = "civicmod.penalty.issued"; // Counter, labelled by type.
pub const PENALTY_REVOKED: &str = "civicmod.penalty.revoked"; // Counter.
pub const PENALTY_EXPIRED: &str = "civicmod.penalty.expired"; // Counter.

pub const APPEAL_SUBMITTED: &str = "civicmod.appeal.submitted"; // Counter.
pub const APPEAL_REVIEWED: &str = "civicmod.appeal.reviewed"; // Counter, labelled by outcome.

pub const TRUST_RECALCULATED: &str = "civicmod.trust.recalculated"; // Counter.
pub const WATCHLIST_MATCHES: &str = "civicmod.watchlist.matches"; // Counter.

/// Describe every moderation counter, and install the push gateway exporter when one is
/// configured. Call once at startup.
pub fn setup(config: Option<&config::MetricConfig>) -> anyhow::Result<()> {
    describe_counter!(PENALTY_ISSUED, "Penalties issued, by penalty type.");
    describe_counter!(
        PENALTY_REVOKED,
        "Penalties revoked by an administrator or an approved appeal."
    );
    describe_counter!(
        PENALTY_EXPIRED,
        "Penalties moved to expired by the sweep or by escalation."
    );

    describe_counter!(APPEAL_SUBMITTED, "Appeals submitted.");
    describe_counter!(APPEAL_REVIEWED, "Appeals reviewed, by outcome.");

    describe_counter!(TRUST_RECALCULATED, "Trust score recalculations.");
    describe_counter!(
        WATCHLIST_MATCHES,
        "Automatic flags raised by watchlist keywords."
    );

    if let Some(config) = config {
        match config {
            config::MetricConfig::PrometheusPush(prometheus_config) => {
                PrometheusBuilder::new()
                    .with_push_gateway(
                        prometheus_config.url.clone(),
                        Duration::from_secs(10),
                        None,
                        None,
                    )
                    .context("failed to set up push gateway")?
                    .install()
                    .context("failed to install metrics exporter")?;
            }
        }
    }

    Ok(())
}
