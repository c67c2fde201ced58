//! Borrowing endpoints

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        ledger::{LedgerEntry, LedgerEntryDetails},
        user::Identity,
    },
};

/// Checkout response
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub msg: String,
    pub entry: LedgerEntry,
}

/// Return response with the closed ledger entry
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    pub status: String,
    pub entry: LedgerEntry,
}

/// Borrow a book instance for the caller
#[utoipa::path(
    post,
    path = "/private/borrow/{unit_id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("unit_id" = i32, Path, description = "Book instance ID")
    ),
    responses(
        (status = 200, description = "Book instance borrowed", body = BorrowResponse),
        (status = 403, description = "Not allowed for this role"),
        (status = 404, description = "Book instance not found"),
        (status = 409, description = "Book instance already borrowed")
    )
)]
pub async fn checkout(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(unit_id): Path<i32>,
) -> AppResult<Json<BorrowResponse>> {
    let entry = state.services.lending.checkout(unit_id, identity.user_id).await?;

    Ok(Json(BorrowResponse {
        msg: "SUCCESS".to_string(),
        entry,
    }))
}

/// Return a borrowed book instance
#[utoipa::path(
    post,
    path = "/private/return/{unit_id}",
    tag = "borrow",
    security(("bearer_auth" = [])),
    params(
        ("unit_id" = i32, Path, description = "Book instance ID")
    ),
    responses(
        (status = 200, description = "Book instance returned", body = ReturnResponse),
        (status = 404, description = "Book instance not found"),
        (status = 409, description = "Book instance is not on loan")
    )
)]
pub async fn return_unit(
    State(state): State<crate::AppState>,
    Path(unit_id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let entry = state.services.lending.return_unit(unit_id).await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        entry,
    }))
}

/// Caller's books currently on loan
#[utoipa::path(
    get,
    path = "/private/borrow",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open loans", body = Vec<LedgerEntryDetails>)
    )
)]
pub async fn active_loans(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Json<Vec<LedgerEntryDetails>>> {
    let loans = state.services.lending.active_loans(identity.user_id).await?;
    Ok(Json(loans))
}

/// Caller's full borrowing history
#[utoipa::path(
    get,
    path = "/private/history",
    tag = "borrow",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Open and closed loans, oldest first", body = Vec<LedgerEntryDetails>)
    )
)]
pub async fn history(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
) -> AppResult<Json<Vec<LedgerEntryDetails>>> {
    let history = state.services.lending.history(identity.user_id).await?;
    Ok(Json(history))
}
