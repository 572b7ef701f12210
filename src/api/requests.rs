//! Book request endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{error::AppResult, models::request::BookRequest};

use super::AuthenticatedUser;

/// Submit a book request
#[derive(Deserialize, ToSchema)]
pub struct CreateBookRequestBody {
    /// Requested ISBN
    pub isbn: Option<String>,
    /// Requested title
    pub title: Option<String>,
    /// Requested author
    pub author: Option<String>,
}

/// Manual fulfillment request
#[derive(Deserialize, ToSchema)]
pub struct FulfillRequestBody {
    /// Catalog book satisfying the request, when one exists
    pub book_id: Option<i32>,
    /// Note shown alongside the fulfillment
    pub note: Option<String>,
}

/// Auto-fulfillment result
#[derive(Serialize, ToSchema)]
pub struct AutoFulfillResponse {
    /// Number of requests fulfilled by this pass
    pub fulfilled_count: u64,
}

/// Request a book not yet in the catalog
#[utoipa::path(
    post,
    path = "/book-requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    request_body = CreateBookRequestBody,
    responses(
        (status = 201, description = "Request recorded", body = BookRequest),
        (status = 400, description = "Neither an ISBN nor a title+author pair"),
        (status = 409, description = "Insufficient credit or duplicate open request")
    )
)]
pub async fn create_request(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(body): Json<CreateBookRequestBody>,
) -> AppResult<(StatusCode, Json<BookRequest>)> {
    let request = state
        .services
        .requests
        .create_request(
            claims.user_id,
            body.isbn.as_deref(),
            body.title.as_deref(),
            body.author.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// List all OPEN requests, oldest first
#[utoipa::path(
    get,
    path = "/book-requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open requests", body = Vec<BookRequest>)
    )
)]
pub async fn list_open(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookRequest>>> {
    claims.require_admin()?;

    let requests = state.services.requests.list_open().await?;
    Ok(Json(requests))
}

/// List requests submitted by a user
#[utoipa::path(
    get,
    path = "/users/{id}/requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's requests", body = Vec<BookRequest>)
    )
)]
pub async fn list_user_requests(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<BookRequest>>> {
    if claims.user_id != user_id {
        claims.require_admin()?;
    }

    let requests = state.services.requests.list_for_user(user_id).await?;
    Ok(Json(requests))
}

/// Manually mark a request fulfilled
#[utoipa::path(
    post,
    path = "/book-requests/{id}/fulfill",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Request ID")
    ),
    request_body = FulfillRequestBody,
    responses(
        (status = 200, description = "Request fulfilled", body = BookRequest),
        (status = 404, description = "Request or book not found"),
        (status = 409, description = "Request not open")
    )
)]
pub async fn fulfill_manually(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(request_id): Path<i32>,
    Json(body): Json<FulfillRequestBody>,
) -> AppResult<Json<BookRequest>> {
    claims.require_admin()?;

    let request = state
        .services
        .requests
        .fulfill_manually(request_id, claims.user_id, body.book_id, body.note.as_deref())
        .await?;
    Ok(Json(request))
}

/// Reconcile open requests against one book
#[utoipa::path(
    post,
    path = "/books/{id}/fulfill-requests",
    tag = "book-requests",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Reconciliation ran", body = AutoFulfillResponse),
        (status = 400, description = "Invalid book id")
    )
)]
pub async fn auto_fulfill(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<AutoFulfillResponse>> {
    claims.require_admin()?;

    let fulfilled_count = state.services.requests.auto_fulfill_for_book(book_id).await?;
    Ok(Json(AutoFulfillResponse { fulfilled_count }))
}
