use axum::{
    routing::{get, patch},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub mod envelopes;
pub mod health;
pub mod zipfiles;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
        .allow_methods(tower_http::cors::AllowMethods::mirror_request())
        .allow_headers(tower_http::cors::AllowHeaders::mirror_request());

    Router::new()
        .route("/zip-files", get(zipfiles::zip_file_status))
        .route("/envelopes", get(envelopes::list_envelopes))
        .route("/envelopes/stale", get(envelopes::list_stale_envelopes))
        .route("/envelopes/:id/status", patch(envelopes::update_status))
        .route("/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
}
