use crate::error::AppError;
use crate::state::AppState;
use crate::ticker::coincap::fetch_snapshot_payload;
use crate::ticker::types::{AssetSet, SnapshotPayloadWire};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct PricesQuery {
    pub ids: Option<String>,
}

/// Proxies the CoinCap asset snapshot for a comma separated id list.
pub async fn prices(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PricesQuery>,
) -> Result<Json<SnapshotPayloadWire>, AppError> {
    let assets = AssetSet::from_raw(query.ids.as_deref().unwrap_or_default().split(','));
    if assets.is_empty() {
        return Err(AppError::InvalidArgument("ids required".to_string()));
    }

    let timeout = state.config.snapshot_timeout();
    let fetch = fetch_snapshot_payload(&state.http_client, &state.config.coincap_rest_url, &assets);
    let payload = tokio::time::timeout(timeout, fetch)
        .await
        .map_err(|_| AppError::Timeout(state.config.snapshot_timeout_ms))?
        .inspect_err(|error| tracing::warn!(key = %assets.key(), %error, "price proxy failed"))?;

    Ok(Json(payload))
}
