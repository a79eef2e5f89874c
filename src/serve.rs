use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use anyhow::Context as _;
use axum::{Router, extract::FromRef, routing::get};
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity, log::LevelFilter};
use figment::{Figment, providers::Format as _};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub use crate::error::Error;
use crate::{
    clock::SystemClock,
    config::AppConfig,
    db,
    moderation::{Moderation, PenaltyLedger},
    store::users,
};

/// The application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Parser, Debug, Clone)]
/// Command line arguments.
pub struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "default.toml")]
    pub config: PathBuf,
    /// The verbosity level.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,
}

#[derive(Clone, FromRef)]
/// The application state, shared across all routes.
pub struct AppState {
    /// The moderation services.
    pub moderation: Moderation,
}

/// Build the HTTP application over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(crate::index))
        .nest("/v1/moderation", crate::endpoints::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically move elapsed timed bans to EXPIRED.
fn spawn_expiry_sweep(ledger: PenaltyLedger, every: Duration) {
    drop(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            _ = interval.tick().await;
            match ledger.expire_old_penalties().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "expiry sweep finished"),
                Err(err) => error!(%err, "expiry sweep failed"),
            }
        }
    }));
}

/// The main application entry point.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up trace logging to console and account for the user-provided verbosity flag.
    if args.verbosity.log_level_filter() != LevelFilter::Off {
        let lvl = match args.verbosity.log_level_filter() {
            LevelFilter::Error => tracing::Level::ERROR,
            LevelFilter::Warn => tracing::Level::WARN,
            LevelFilter::Info | LevelFilter::Off => tracing::Level::INFO,
            LevelFilter::Debug => tracing::Level::DEBUG,
            LevelFilter::Trace => tracing::Level::TRACE,
        };
        tracing_subscriber::fmt().with_max_level(lvl).init();
    }

    if !args.config.exists() {
        // Not fatal: every setting can also come from the environment.
        warn!(
            "configuration file {} does not exist",
            args.config.display()
        );
    }

    let config: AppConfig = Figment::new()
        .admerge(figment::providers::Toml::file(args.config))
        .admerge(figment::providers::Env::prefixed("CIVICMOD_"))
        .extract()
        .context("failed to load configuration")?;

    crate::metrics::setup(config.metrics.as_ref()).context("failed to set up metrics exporter")?;

    let pool = db::establish_pool(&config.db)
        .await
        .context("failed to establish database connection pool")?;
    db::migrate(&pool).await?;

    // Automatic flags are filed under this user, so it has to exist.
    let system_user_id = config.moderation.system_user_id;
    let mut conn = pool.acquire().await.context("failed to get db connection")?;
    users::ensure(&mut conn, system_user_id, "system")
        .await
        .context("failed to create system user")?;
    drop(conn);

    let moderation = Moderation::new(pool.clone(), Arc::new(SystemClock), system_user_id);

    if config.moderation.expiry_sweep_secs > 0 {
        spawn_expiry_sweep(
            moderation.ledger.clone(),
            Duration::from_secs(config.moderation.expiry_sweep_secs),
        );
    } else {
        info!("in-process expiry sweep disabled");
    }

    let addr = config
        .listen_address
        .unwrap_or(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000));

    let app = router(AppState { moderation });

    info!("listening on {addr}");

    let listener = TcpListener::bind(&addr)
        .await
        .context("failed to bind address")?;

    axum::serve(listener, app.into_make_service())
        .await
        .context("failed to serve app")
}
