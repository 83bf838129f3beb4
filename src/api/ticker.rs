use crate::error::AppError;
use crate::state::AppState;
use crate::ticker::{DesiredAssetsOutcome, TickerSnapshot};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SetAssetsArgs {
    #[serde(default)]
    pub assets: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAssetsResponse {
    pub resubscribed: bool,
    pub snapshot: TickerSnapshot,
}

pub async fn snapshot(State(state): State<Arc<AppState>>) -> Json<TickerSnapshot> {
    Json(state.ticker.snapshot())
}

pub async fn set_assets(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SetAssetsArgs>, JsonRejection>,
) -> Result<Json<SetAssetsResponse>, AppError> {
    let Json(args) = payload.map_err(|rejection| AppError::InvalidArgument(rejection.body_text()))?;
    let outcome = state.ticker.set_desired_assets(&args.assets).await;

    Ok(Json(SetAssetsResponse {
        resubscribed: matches!(outcome, DesiredAssetsOutcome::Subscribe(_)),
        snapshot: state.ticker.snapshot(),
    }))
}

pub async fn open(State(state): State<Arc<AppState>>) -> Json<TickerSnapshot> {
    state.ticker.open().await;
    Json(state.ticker.snapshot())
}

pub async fn close(State(state): State<Arc<AppState>>) -> Json<TickerSnapshot> {
    state.ticker.close().await;
    Json(state.ticker.snapshot())
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{body_json, empty_request, json_request, send, test_state};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn starts_idle() {
        let state = test_state().await;

        let body = body_json(send(&state, empty_request("GET", "/ticker")).await).await;

        assert_eq!(body["status"], "idle");
        assert_eq!(body["key"], "");
        assert_eq!(body["prices"], json!({}));
    }

    #[tokio::test]
    async fn setting_assets_reports_canonical_key() {
        let state = test_state().await;

        let first = send(
            &state,
            json_request("PUT", "/ticker/assets", json!({ "assets": ["Ethereum", " bitcoin "] })),
        )
        .await;
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["resubscribed"], true);
        assert_eq!(first["snapshot"]["key"], "bitcoin,ethereum");
        assert_eq!(first["snapshot"]["assets"], json!(["bitcoin", "ethereum"]));

        let second = body_json(
            send(
                &state,
                json_request("PUT", "/ticker/assets", json!({ "assets": ["BITCOIN", "ethereum"] })),
            )
            .await,
        )
        .await;
        assert_eq!(second["resubscribed"], false);
    }

    #[tokio::test]
    async fn clearing_assets_goes_idle() {
        let state = test_state().await;
        send(&state, json_request("PUT", "/ticker/assets", json!({ "assets": ["bitcoin"] }))).await;

        let body = body_json(
            send(&state, json_request("PUT", "/ticker/assets", json!({ "assets": [] }))).await,
        )
        .await;

        assert_eq!(body["resubscribed"], false);
        assert_eq!(body["snapshot"]["status"], "idle");
    }

    #[tokio::test]
    async fn close_keeps_the_asset_set() {
        let state = test_state().await;
        send(&state, json_request("PUT", "/ticker/assets", json!({ "assets": ["solana"] }))).await;

        let body = body_json(send(&state, empty_request("POST", "/ticker/close")).await).await;

        assert_eq!(body["status"], "closed");
        assert_eq!(body["key"], "solana");
    }

    #[tokio::test]
    async fn open_without_assets_stays_idle() {
        let state = test_state().await;
        let body = body_json(send(&state, empty_request("POST", "/ticker/open")).await).await;
        assert_eq!(body["status"], "idle");
    }
}
