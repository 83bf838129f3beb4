use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::{Connection, SqlitePool};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DbStatus {
    Ok,
    Error,
}

pub async fn probe_database(pool: &SqlitePool) -> DbStatus {
    let result = match pool.acquire().await {
        Ok(mut connection) => connection.ping().await,
        Err(error) => Err(error),
    };
    match result {
        Ok(()) => DbStatus::Ok,
        Err(error) => {
            tracing::warn!(%error, "database health probe failed");
            DbStatus::Error
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    pub uptime_ms: u64,
    pub db: DbStatus,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let uptime_ms = u64::try_from(state.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
    Json(HealthResponse {
        ok: true,
        uptime_ms,
        db: probe_database(&state.db_pool).await,
    })
}
