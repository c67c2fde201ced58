//! Book instance (lending unit) administration

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        lending_unit::{CreateLendingUnit, LendingUnit, UpdateLendingUnit},
        user::Identity,
    },
};

#[derive(Serialize, ToSchema)]
pub struct InstanceResponse {
    pub book_instance: LendingUnit,
}

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub msg: String,
}

/// Create a book instance. New instances are always available.
#[utoipa::path(
    post,
    path = "/private/book/{book_id}/instance",
    tag = "book-instances",
    security(("bearer_auth" = [])),
    params(("book_id" = i32, Path, description = "Book ID")),
    request_body = CreateLendingUnit,
    responses(
        (status = 200, description = "Book instance created", body = InstanceResponse),
        (status = 400, description = "Invalid language"),
        (status = 404, description = "Book does not exist")
    )
)]
pub async fn create_instance(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path(book_id): Path<i32>,
    Json(data): Json<CreateLendingUnit>,
) -> AppResult<Json<InstanceResponse>> {
    data.validate()?;

    let unit = state
        .services
        .lending
        .create_unit(book_id, &data, identity.user_id)
        .await?;

    Ok(Json(InstanceResponse { book_instance: unit }))
}

/// Get a book instance
#[utoipa::path(
    get,
    path = "/private/book/{book_id}/instance/{id}",
    tag = "book-instances",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID"),
        ("id" = i32, Path, description = "Book instance ID")
    ),
    responses(
        (status = 200, description = "Book instance", body = InstanceResponse),
        (status = 404, description = "Book instance not found")
    )
)]
pub async fn get_instance(
    State(state): State<crate::AppState>,
    Path((book_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<InstanceResponse>> {
    let unit = state.services.lending.get_unit(book_id, id).await?;
    Ok(Json(InstanceResponse { book_instance: unit }))
}

/// Update a book instance's metadata
#[utoipa::path(
    patch,
    path = "/private/book/{book_id}/instance/{id}",
    tag = "book-instances",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID"),
        ("id" = i32, Path, description = "Book instance ID")
    ),
    request_body = UpdateLendingUnit,
    responses(
        (status = 200, description = "Book instance updated", body = InstanceResponse),
        (status = 404, description = "Book instance not found")
    )
)]
pub async fn update_instance(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path((book_id, id)): Path<(i32, i32)>,
    Json(data): Json<UpdateLendingUnit>,
) -> AppResult<Json<InstanceResponse>> {
    data.validate()?;

    let unit = state
        .services
        .lending
        .update_unit(book_id, id, &data, identity.user_id)
        .await?;

    Ok(Json(InstanceResponse { book_instance: unit }))
}

/// Delete a book instance
#[utoipa::path(
    delete,
    path = "/private/book/{book_id}/instance/{id}",
    tag = "book-instances",
    security(("bearer_auth" = [])),
    params(
        ("book_id" = i32, Path, description = "Book ID"),
        ("id" = i32, Path, description = "Book instance ID")
    ),
    responses(
        (status = 200, description = "Book instance deleted", body = MessageResponse),
        (status = 404, description = "Book instance not found"),
        (status = 409, description = "Book instance is on loan")
    )
)]
pub async fn delete_instance(
    State(state): State<crate::AppState>,
    Extension(identity): Extension<Identity>,
    Path((book_id, id)): Path<(i32, i32)>,
) -> AppResult<Json<MessageResponse>> {
    state
        .services
        .lending
        .delete_unit(book_id, id, identity.user_id)
        .await?;

    Ok(Json(MessageResponse {
        msg: "SUCCESS".to_string(),
    }))
}
