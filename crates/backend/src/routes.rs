use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::handlers;
use crate::shared::data::db::AppState;

/// All application routes. The dashboard API is read-only: GET only.
pub fn configure_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/api/dashboard-data",
            get(handlers::d100_sales_overview::get_dashboard_data),
        )
        .layer(cors)
        .with_state(state)
}
