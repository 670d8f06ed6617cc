//! Order CRUD endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::db::{self, OrderPayload};
use crate::AppState;

use super::error::ApiError;
use super::response::{MessageResponse, OrderListResponse, OrderResponse};

/// Place an order on behalf of `user`
#[utoipa::path(
    post,
    path = "/{user}/order",
    tag = "orders",
    params(("user" = String, Path, description = "Username of the buyer")),
    request_body = OrderPayload,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Missing body or unknown product", body = ErrorResponse),
        (status = 404, description = "Unknown user", body = ErrorResponse)
    )
)]
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    payload: Option<Json<OrderPayload>>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::missing_body());
    };

    let user_id = db::find_user_id(&state.db, &user)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", user)))?;

    let order = db::create_order(&state.db, &payload, Some(user_id)).await?;
    info!(order_id = order.id, product_id = order.product_id, user = %user, "Order created");

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            message: "Order created successfully".to_string(),
            order,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/orders",
    tag = "orders",
    responses((status = 200, description = "All orders", body = OrderListResponse))
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let orders = db::list_orders(&state.db).await?;

    Ok(Json(OrderListResponse {
        message: "Orders fetched successfully".to_string(),
        orders,
    }))
}

#[utoipa::path(
    get,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderResponse),
        (status = 404, description = "No such order", body = ErrorResponse)
    )
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = db::get_order(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    Ok(Json(OrderResponse {
        message: "Order fetched successfully".to_string(),
        order,
    }))
}

#[utoipa::path(
    put,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    request_body = OrderPayload,
    responses(
        (status = 200, description = "Update applied", body = MessageResponse),
        (status = 400, description = "Missing body or unknown product", body = ErrorResponse)
    )
)]
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Option<Json<OrderPayload>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Some(Json(payload)) = payload else {
        return Err(ApiError::missing_body());
    };

    let rows = db::update_order(&state.db, id, &payload).await?;
    info!(order_id = id, rows, "Order updated");

    Ok(Json(MessageResponse::new("Order updated successfully")))
}

#[utoipa::path(
    delete,
    path = "/order/{id}",
    tag = "orders",
    params(("id" = i64, Path, description = "Order id")),
    responses((status = 200, description = "Delete applied", body = MessageResponse))
)]
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    let rows = db::delete_order(&state.db, id).await?;
    info!(order_id = id, rows, "Order deleted");

    Ok(Json(MessageResponse::new("Order deleted successfully")))
}
