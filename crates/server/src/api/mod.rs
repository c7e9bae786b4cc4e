pub mod audit;
pub mod error;
pub mod identity;
pub mod requests;
pub mod state;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use purchasing_core::config::ApiConfig;
use purchasing_db::DbPool;

use crate::health;
pub use state::ApiState;

#[derive(Clone, Debug, Serialize)]
pub struct Welcome {
    pub message: &'static str,
    pub name: String,
    pub version: String,
}

/// Full HTTP surface: the welcome route, `/health`, and the request and audit
/// routes mounted under the configured prefix.
pub fn router(state: ApiState, db_pool: DbPool, api: &ApiConfig) -> Router {
    let routes = Router::new()
        .route("/requests", get(requests::list_requests).post(requests::create_request))
        .route(
            "/requests/{id}",
            get(requests::get_request)
                .put(requests::update_request)
                .delete(requests::delete_request),
        )
        .route(
            "/requests/{id}/status",
            post(requests::change_status).put(requests::change_status),
        )
        .route("/audit", get(audit::list_audit))
        .with_state(state);

    let welcome = Welcome {
        message: "Welcome to Purchase Request API",
        name: api.project_name.clone(),
        version: api.version.clone(),
    };
    let app = Router::new()
        .route("/", get(move || async move { Json(welcome) }))
        .merge(health::router(db_pool));

    let app = if api.prefix == "/" { app.merge(routes) } else { app.nest(&api.prefix, routes) };

    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}
