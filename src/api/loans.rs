//! Loan lifecycle endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::loan::LoanDetails,
};

use super::AuthenticatedUser;

/// Borrow request
#[derive(Deserialize, ToSchema)]
pub struct BorrowRequest {
    /// Book ID to borrow
    pub book_id: Option<i32>,
}

/// Reject request
#[derive(Deserialize, ToSchema)]
pub struct RejectRequest {
    /// Reason shown to the user
    pub reason: Option<String>,
}

/// Admin return request
#[derive(Deserialize, ToSchema)]
pub struct AdminReturnRequest {
    /// Return date; defaults to now. Must lie between the borrow date and now.
    pub return_date: Option<DateTime<Utc>>,
}

/// Mark-lost request
#[derive(Deserialize, ToSchema)]
pub struct MarkLostRequest {
    /// Penalty charged to the borrower
    pub penalty_amount: Option<Decimal>,
    /// Internal note
    pub note: Option<String>,
}

/// Admin direct checkout request
#[derive(Deserialize, ToSchema)]
pub struct AdminCreateLoanRequest {
    /// Borrower user ID
    pub user_id: Option<i32>,
    /// Book ID
    pub book_id: Option<i32>,
    /// Due date, must be in the future
    pub due_date: Option<DateTime<Utc>>,
}

/// Response for a created direct checkout
#[derive(Serialize, ToSchema)]
pub struct AdminCreateLoanResponse {
    /// New loan ID
    pub id: i32,
    /// Status message
    pub message: String,
}

/// Generic status response
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    /// Operation status
    pub status: String,
}

/// Get loans for a specific user
#[utoipa::path(
    get,
    path = "/users/{id}/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's loans", body = Vec<LoanDetails>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_loans(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    if claims.user_id != user_id {
        claims.require_admin()?;
    }

    let loans = state.services.loans.get_user_loans(user_id).await?;
    Ok(Json(loans))
}

/// Borrow a book: creates a PENDING loan awaiting admin review
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Loan request created", body = LoanDetails),
        (status = 400, description = "Missing book id"),
        (status = 403, description = "Lending disabled"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Loan cap reached, duplicate open loan, or no copies")
    )
)]
pub async fn borrow(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<LoanDetails>)> {
    let book_id = request
        .book_id
        .ok_or_else(|| AppError::BadRequest("book_id is required".to_string()))?;

    let loan = state.services.loans.borrow(claims.user_id, book_id).await?;
    Ok((StatusCode::CREATED, Json(loan)))
}

/// Approve a pending loan request
#[utoipa::path(
    post,
    path = "/loans/{id}/approve",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan approved", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Not pending, no copies, or cap reached")
    )
)]
pub async fn approve(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state.services.loans.approve(loan_id, claims.user_id).await?;
    Ok(Json(loan))
}

/// Reject a pending loan request
#[utoipa::path(
    post,
    path = "/loans/{id}/reject",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Loan rejected", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Not pending")
    )
)]
pub async fn reject(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<RejectRequest>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state
        .services
        .loans
        .reject(loan_id, claims.user_id, request.reason.as_deref())
        .await?;
    Ok(Json(loan))
}

/// Return one of the caller's own loans
#[utoipa::path(
    post,
    path = "/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not outstanding")
    )
)]
pub async fn return_own(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanDetails>> {
    let loan = state
        .services
        .loans
        .return_own_loan(loan_id, claims.user_id)
        .await?;
    Ok(Json(loan))
}

/// Record a return on behalf of a user, optionally backdated
#[utoipa::path(
    post,
    path = "/admin/loans/{id}/return",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = AdminReturnRequest,
    responses(
        (status = 200, description = "Loan returned", body = LoanDetails),
        (status = 400, description = "Invalid return date"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not outstanding")
    )
)]
pub async fn admin_return(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<AdminReturnRequest>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state
        .services
        .loans
        .admin_return(loan_id, claims.user_id, request.return_date)
        .await?;
    Ok(Json(loan))
}

/// Write off an outstanding loan as lost
#[utoipa::path(
    post,
    path = "/admin/loans/{id}/lost",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = MarkLostRequest,
    responses(
        (status = 200, description = "Loan marked lost", body = LoanDetails),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan not outstanding")
    )
)]
pub async fn mark_lost(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<MarkLostRequest>,
) -> AppResult<Json<LoanDetails>> {
    claims.require_admin()?;

    let loan = state
        .services
        .loans
        .mark_lost(loan_id, claims.user_id, request.penalty_amount, request.note.as_deref())
        .await?;
    Ok(Json(loan))
}

/// Walk-in checkout: create an ACTIVE loan directly
#[utoipa::path(
    post,
    path = "/admin/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = AdminCreateLoanRequest,
    responses(
        (status = 201, description = "Loan created", body = AdminCreateLoanResponse),
        (status = 400, description = "Missing fields or past due date"),
        (status = 404, description = "User or book not found"),
        (status = 409, description = "No copies, cap reached, or duplicate loan")
    )
)]
pub async fn admin_create(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<AdminCreateLoanRequest>,
) -> AppResult<(StatusCode, Json<AdminCreateLoanResponse>)> {
    claims.require_admin()?;

    let (user_id, book_id, due_date) = match (request.user_id, request.book_id, request.due_date) {
        (Some(u), Some(b), Some(d)) => (u, b, d),
        _ => {
            return Err(AppError::BadRequest(
                "user_id, book_id and due_date are required".to_string(),
            ))
        }
    };

    let loan_id = state
        .services
        .loans
        .admin_create(claims.user_id, user_id, book_id, due_date)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AdminCreateLoanResponse {
            id: loan_id,
            message: "Loan created".to_string(),
        }),
    ))
}

/// Hard-delete a loan, undoing its reservation if it held a copy
#[utoipa::path(
    delete,
    path = "/admin/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan deleted", body = StatusResponse),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn admin_delete(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<StatusResponse>> {
    claims.require_admin()?;

    state.services.loans.admin_delete(loan_id).await?;
    Ok(Json(StatusResponse {
        status: "deleted".to_string(),
    }))
}
