use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod counters;
pub mod health;
pub mod org_units;
pub mod requests;
pub mod templates;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let requests_routes = Router::new()
        .route(
            "/",
            get(requests::list_requests).post(requests::submit_request),
        )
        .route("/:id", get(requests::get_request))
        .route("/:id/history", get(requests::get_request_history))
        .route("/:id/forward", post(requests::forward_request))
        .route("/:id/decision", post(requests::decide_request));

    let templates_routes = Router::new()
        .route(
            "/",
            get(templates::list_templates).post(templates::create_template),
        )
        .route(
            "/:category",
            axum::routing::patch(templates::update_template).delete(templates::delete_template),
        );

    let org_units_routes = Router::new()
        .route(
            "/",
            get(org_units::list_org_units).post(org_units::create_org_unit),
        )
        .route(
            "/:id",
            axum::routing::patch(org_units::update_org_unit).delete(org_units::delete_org_unit),
        );

    Router::new()
        .nest("/api/requests", requests_routes)
        .nest("/api/templates", templates_routes)
        .nest("/api/org-units", org_units_routes)
        .route("/api/counters", get(counters::list_counters))
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
