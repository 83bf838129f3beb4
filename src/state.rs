use crate::api::graphql::{build_schema, TodoSchema};
use crate::api::rate_limit::RateLimiter;
use crate::config::AppConfig;
use crate::ticker::TickerManager;
use reqwest::Client;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub started_at: Instant,
    pub config: AppConfig,
    pub db_pool: SqlitePool,
    pub http_client: Client,
    pub ticker: Arc<TickerManager>,
    pub schema: TodoSchema,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        db_pool: SqlitePool,
        http_client: Client,
        ticker: Arc<TickerManager>,
    ) -> Self {
        let schema = build_schema(db_pool.clone());
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_per_minute,
            config.rate_limit_trust_forwarded,
        ));

        Self {
            started_at: Instant::now(),
            config,
            db_pool,
            http_client,
            ticker,
            schema,
            rate_limiter,
        }
    }
}
