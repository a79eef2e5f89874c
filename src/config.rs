use std::net::SocketAddr;

use serde::Deserialize;
use url::Url;

#[derive(Deserialize, Debug, Clone)]
pub struct PrometheusConfig {
    /// The URL of the Prometheus push gateway.
    pub url: Url,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum MetricConfig {
    PrometheusPush(PrometheusConfig),
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModerationConfig {
    /// The user recorded as the reporter of automatic (watchlist) flags.
    #[serde(default = "default_system_user")]
    pub system_user_id: i64,
    /// Seconds between penalty expiry sweeps. Zero leaves sweeping to an external job.
    #[serde(default = "default_sweep")]
    pub expiry_sweep_secs: u64,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            system_user_id: default_system_user(),
            expiry_sweep_secs: default_sweep(),
        }
    }
}

const fn default_system_user() -> i64 {
    1
}

const fn default_sweep() -> u64 {
    300
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub listen_address: Option<SocketAddr>,
    /// SQLite connection string, e.g. `sqlite://civicmod.db`.
    pub db: String,
    pub metrics: Option<MetricConfig>,
    #[serde(default)]
    pub moderation: ModerationConfig,
}
