pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::deliveries::{analytics, handlers as deliveries};
use crate::scout::handlers as scout;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Generation
        .route("/api/v1/gemini", post(scout::handle_generate_field))
        .route("/api/v1/scout/analyze", post(scout::handle_analyze))
        .route("/api/v1/scout/generate", post(scout::handle_generate_scout))
        // Delivery log
        .route(
            "/api/v1/deliveries",
            get(deliveries::handle_list_deliveries).post(deliveries::handle_create_delivery),
        )
        .route(
            "/api/v1/deliveries/export.csv",
            get(deliveries::handle_export_csv),
        )
        .route(
            "/api/v1/deliveries/:id",
            get(deliveries::handle_get_delivery)
                .patch(deliveries::handle_patch_delivery)
                .delete(deliveries::handle_delete_delivery),
        )
        .route(
            "/api/v1/deliveries/:id/status",
            patch(deliveries::handle_set_status),
        )
        .route(
            "/api/v1/analytics/deliveries",
            get(analytics::handle_delivery_analytics),
        )
        // Staging-only maintenance
        .route(
            "/api/v1/admin/import-deliveries",
            post(deliveries::handle_import_deliveries),
        )
        .with_state(state)
}
