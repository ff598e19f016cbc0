//! HTTP surface: router, shared state, and handlers.

mod designs;
pub mod error;
mod layers;
mod middleware;
mod public;

pub use public::BrowserConfig;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::{designs::DesignService, layers::LayerDeliveryService};

use self::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub designs: Arc<DesignService>,
    pub layers: Arc<LayerDeliveryService>,
    pub browser_config: Arc<BrowserConfig>,
    pub max_request_bytes: usize,
}

pub fn build_router(state: HttpState) -> Router {
    let save_limit = DefaultBodyLimit::max(state.max_request_bytes);

    Router::new()
        .route("/config.js", get(public::config_js))
        .route("/_health", get(public::health))
        .route(
            "/api/designs",
            get(designs::list_designs).post(designs::create_design),
        )
        .route(
            "/api/designs/{design_id}",
            get(designs::load_design).delete(designs::delete_design),
        )
        .route(
            "/api/designs/{design_id}/layers/{layer_file}",
            get(layers::serve_layer),
        )
        .route(
            "/api/designs/{design_id}/save",
            post(designs::save_design).layer(save_limit),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
