pub mod external;
pub mod graphql;
pub mod health;
pub mod rate_limit;
pub mod ticker;
pub mod todos;

use crate::state::AppState;
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/todos", get(todos::list).post(todos::create))
        .route(
            "/todos/:id",
            get(todos::get_one).patch(todos::update).delete(todos::remove),
        )
        .route("/graphql", get(graphql::graphiql).post(graphql::graphql))
        .route("/external/prices", get(external::prices))
        .route("/ticker", get(ticker::snapshot))
        .route("/ticker/assets", put(ticker::set_assets))
        .route("/ticker/open", post(ticker::open))
        .route("/ticker/close", post(ticker::close))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state.rate_limiter),
            rate_limit::rate_limit_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
