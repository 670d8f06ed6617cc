//! Product CRUD endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::db::{self, ProductPayload};
use crate::AppState;

use super::error::{is_foreign_key_violation, ApiError};
use super::response::{MessageResponse, ProductListResponse, ProductResponse};

/// Create a product owned by `user`
#[utoipa::path(
    post,
    path = "/{user}/product",
    tag = "products",
    params(("user" = String, Path, description = "Username of the owner")),
    request_body = ProductPayload,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Missing or malformed body", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    payload: Option<Json<ProductPayload>>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::missing_body());
    };

    let user_id = db::find_user_id(&state.db, &user)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", user)))?;

    let product = db::create_product(&state.db, &payload, Some(user_id)).await?;
    info!(product_id = product.id, user = %user, "Product created");

    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            message: "Product created successfully".to_string(),
            product,
        }),
    ))
}

/// List every product
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    responses((status = 200, description = "All products", body = ProductListResponse))
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let products = db::list_products(&state.db).await?;

    Ok(Json(ProductListResponse {
        message: "Products fetched successfully".to_string(),
        products,
    }))
}

#[utoipa::path(
    get,
    path = "/product/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = ProductResponse),
        (status = 404, description = "No such product", body = ErrorResponse)
    )
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = db::get_product(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    Ok(Json(ProductResponse {
        message: "Product fetched successfully".to_string(),
        product,
    }))
}

/// Replace a product's name and price. Unknown ids are not an error.
#[utoipa::path(
    put,
    path = "/product/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductPayload,
    responses(
        (status = 200, description = "Update applied", body = MessageResponse),
        (status = 400, description = "Missing or malformed body", body = ErrorResponse)
    )
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Option<Json<ProductPayload>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::missing_body());
    };

    let rows = db::update_product(&state.db, id, &payload).await?;
    info!(product_id = id, rows, "Product updated");

    Ok(Json(MessageResponse::new("Product updated successfully")))
}

/// Delete a product. Unknown ids are not an error; products still named by
/// an order are.
#[utoipa::path(
    delete,
    path = "/product/{id}",
    tag = "products",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Delete applied", body = MessageResponse),
        (status = 409, description = "Product is referenced by orders", body = ErrorResponse)
    )
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = db::delete_product(&state.db, id).await.map_err(|e| {
        if is_foreign_key_violation(&e) {
            ApiError::conflict("Product is referenced by existing orders")
        } else {
            ApiError::from(e)
        }
    })?;
    info!(product_id = id, rows, "Product deleted");

    Ok(Json(MessageResponse::new("Product deleted successfully")))
}
