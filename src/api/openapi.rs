//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{borrow, health, instances, logs};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "0.3.0",
        description = "Library lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Borrowing
        borrow::checkout,
        borrow::return_unit,
        borrow::active_loans,
        borrow::history,
        // Book instances
        instances::create_instance,
        instances::get_instance,
        instances::update_instance,
        instances::delete_instance,
        // System logs
        logs::list_logs,
    ),
    components(
        schemas(
            // Borrowing
            borrow::BorrowResponse,
            borrow::ReturnResponse,
            crate::models::ledger::LedgerEntry,
            crate::models::ledger::LedgerEntryDetails,
            // Book instances
            instances::InstanceResponse,
            instances::MessageResponse,
            crate::models::lending_unit::LendingUnit,
            crate::models::lending_unit::UnitStatus,
            crate::models::lending_unit::CreateLendingUnit,
            crate::models::lending_unit::UpdateLendingUnit,
            // System logs
            crate::models::audit::LogEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "borrow", description = "Borrowing and returning book instances"),
        (name = "book-instances", description = "Book instance administration"),
        (name = "system-logs", description = "Audit trail")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
