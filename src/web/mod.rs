//! HTTP surface of the activity provider.
//!
//! Every contract route has a shorter compatibility alias; both paths hit
//! the same handler.

pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    http::{HeaderName, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use error::{ErrorResponse, WebError};
pub use state::AppState;

use handlers::{
    analytics_list_url, analytics_url, config_url, game_page, healthcheck, json_params_url,
    user_url,
};

pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(healthcheck))
        .route("/config_url", get(config_url))
        .route("/config", get(config_url))
        .route("/json_params_url", get(json_params_url))
        .route("/params", get(json_params_url))
        .route("/user_url", get(user_url))
        .route("/deploy", get(user_url))
        .route("/analytics_list_url", get(analytics_list_url))
        .route("/analytics/available", get(analytics_list_url))
        .route("/analytics_url", post(analytics_url))
        .route("/analytics", post(analytics_url))
        .route("/game/:activity_id", get(game_page))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .with_state(state)
}
