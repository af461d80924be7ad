//! HTTP surface over the evaluation facade.

mod error;
mod handlers;
mod middleware;
mod state;

pub use error::{ApiError, codes};
pub use handlers::identity_from_query;
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use state::HttpState;

use axum::{Router, middleware as axum_middleware, routing::get};

use self::middleware::{log_responses, set_request_context};

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/gate/{name}", get(handlers::check_gate))
        .route("/config/{name}", get(handlers::get_config))
        .route("/params/{name}", get(handlers::get_params))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
