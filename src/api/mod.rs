pub mod auth;
pub mod error;
mod inventory;
mod part_requests;
mod profile;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Auth routes (public)
    let auth_routes = Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    // Everything below resolves the caller through the `CurrentUser` extractor
    let profile_routes = Router::new()
        .route("/view", get(profile::view))
        .route("/edit", patch(profile::edit));

    let api_routes = Router::new()
        // Inventory
        .route(
            "/inventory",
            get(inventory::list_items).post(inventory::create_item),
        )
        .route("/inventory/po/:po_number", get(inventory::find_by_po_number))
        .route("/inventory/dc/:dc_number", get(inventory::find_by_dc_number))
        .route(
            "/inventory/:id",
            get(inventory::get_item).patch(inventory::update_item),
        )
        .route("/inventory/:id/remarks", post(inventory::add_remark))
        // Part requests
        .route(
            "/part-request",
            get(part_requests::list_requests).post(part_requests::create_request),
        )
        .route("/part-request/overdue", get(part_requests::list_overdue))
        .route("/part-request/:id", get(part_requests::get_request))
        .route("/part-request/:id/status", patch(part_requests::change_status));

    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .nest("/profile", profile_routes)
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Credentialed CORS for the configured web client origins
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn health_check() -> &'static str {
    "OK"
}
