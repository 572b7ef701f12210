//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, loans, requests, settings};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Folio API",
        version = "1.0.0",
        description = "Book Lending Platform REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Loans
        loans::get_user_loans,
        loans::borrow,
        loans::approve,
        loans::reject,
        loans::return_own,
        loans::admin_return,
        loans::mark_lost,
        loans::admin_create,
        loans::admin_delete,
        // Book requests
        requests::create_request,
        requests::list_open,
        requests::list_user_requests,
        requests::fulfill_manually,
        requests::auto_fulfill,
        // Settings
        settings::get_settings,
        settings::update_settings,
    ),
    components(
        schemas(
            // Loans
            loans::BorrowRequest,
            loans::RejectRequest,
            loans::AdminReturnRequest,
            loans::MarkLostRequest,
            loans::AdminCreateLoanRequest,
            loans::AdminCreateLoanResponse,
            loans::StatusResponse,
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            // Book requests
            requests::CreateBookRequestBody,
            requests::FulfillRequestBody,
            requests::AutoFulfillResponse,
            crate::models::request::BookRequest,
            crate::models::request::RequestStatus,
            crate::models::book::Book,
            // Settings
            crate::repository::settings::LendingSettings,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "loans", description = "Loan lifecycle management"),
        (name = "book-requests", description = "Book acquisition requests"),
        (name = "settings", description = "Lending policy settings")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new().merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
