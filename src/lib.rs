pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod ticker;
pub mod todos;

use api::create_router;
use api::rate_limit::RateLimiter;
use config::AppConfig;
use db::open_pool;
use error::AppError;
use state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use ticker::coincap::CoinCapFeed;
use ticker::TickerManager;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,todo_ticker_lib=debug";
const RATE_LIMIT_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

fn spawn_rate_limit_pruner(
    limiter: Arc<RateLimiter>,
    cancellation_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_PRUNE_INTERVAL);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => limiter.prune_idle(),
            }
        }
    })
}

pub async fn run() -> Result<(), AppError> {
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = config.socket_addr()?;
    let db_pool = open_pool(&config).await?;
    let http_client = reqwest::Client::builder()
        .user_agent(concat!("todo-ticker/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let feed = Arc::new(CoinCapFeed::new(
        http_client.clone(),
        config.coincap_ws_url.clone(),
        config.coincap_rest_url.clone(),
    ));
    let ticker = Arc::new(TickerManager::new(feed, config.snapshot_timeout()));
    ticker.set_desired_assets(config.initial_assets.iter()).await;

    let state = Arc::new(AppState::new(
        config,
        db_pool.clone(),
        http_client,
        Arc::clone(&ticker),
    ));
    let background = CancellationToken::new();
    let pruner = spawn_rate_limit_pruner(Arc::clone(&state.rate_limiter), background.clone());

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "todo-ticker listening");

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    background.cancel();
    if let Err(error) = pruner.await {
        warn!(%error, "rate limit pruner failed");
    }
    ticker.dispose().await;
    db_pool.close().await;

    served?;
    info!("todo-ticker stopped");
    Ok(())
}
