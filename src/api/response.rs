//! JSON envelopes shared by the resource handlers.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::{Order, Product};

/// Confirmation with no payload
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub message: String,
    pub product: Product,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub message: String,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub message: String,
    pub order: Order,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub message: String,
    pub orders: Vec<Order>,
}
