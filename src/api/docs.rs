//! OpenAPI description of the JSON endpoints.

use axum::Json;
use utoipa::OpenApi;

use crate::db::{Order, OrderPayload, Product, ProductPayload};

use super::error::ErrorResponse;
use super::response::{
    MessageResponse, OrderListResponse, OrderResponse, ProductListResponse, ProductResponse,
};
use super::{orders, products};

#[derive(OpenApi)]
#[openapi(
    info(title = "storefront", description = "Product and order API"),
    paths(
        products::create_product,
        products::list_products,
        products::get_product,
        products::update_product,
        products::delete_product,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
    ),
    components(schemas(
        Product,
        ProductPayload,
        ProductResponse,
        ProductListResponse,
        Order,
        OrderPayload,
        OrderResponse,
        OrderListResponse,
        MessageResponse,
        ErrorResponse,
    )),
    tags(
        (name = "products", description = "Product catalogue"),
        (name = "orders", description = "Orders placed against products")
    )
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_resource_paths() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        let paths = doc["paths"].as_object().unwrap();

        for path in ["/{user}/product", "/products", "/product/{id}", "/{user}/order", "/orders", "/order/{id}"] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(paths["/product/{id}"].get("delete").is_some());
        assert!(doc["components"]["schemas"].get("ProductPayload").is_some());
    }

    #[test]
    fn test_error_responses_reference_error_schema() {
        let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
        assert!(doc["components"]["schemas"].get("ErrorResponse").is_some());

        let conflict = &doc["paths"]["/product/{id}"]["delete"]["responses"]["409"];
        let schema_ref = conflict["content"]["application/json"]["schema"]["$ref"]
            .as_str()
            .unwrap();
        assert_eq!(schema_ref, "#/components/schemas/ErrorResponse");
    }
}
