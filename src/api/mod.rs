pub mod auth;
mod docs;
pub mod error;
mod orders;
mod products;
pub mod rate_limit;
mod response;

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::CorsConfig;
use crate::ui;
use crate::AppState;

pub use docs::ApiDoc;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Login and registration forms
    let auth_routes = Router::new()
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout));

    // HTML pages; the guarded ones check the token cookie themselves
    let page_routes = Router::new()
        .route("/", get(ui::index))
        .route("/auth", get(ui::auth_home))
        .route("/admin/:user", get(ui::admin_page))
        .route("/:user", get(ui::user_page));

    // JSON resources
    let api_routes = Router::new()
        // Products
        .route("/:user/product", post(products::create_product))
        .route("/products", get(products::list_products))
        .route(
            "/product/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        // Orders
        .route("/:user/order", post(orders::create_order))
        .route("/orders", get(orders::list_orders))
        .route(
            "/order/:id",
            get(orders::get_order)
                .put(orders::update_order)
                .delete(orders::delete_order),
        );

    Router::new()
        .route("/health", get(health_check))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .merge(auth_routes)
        .merge(page_routes)
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit,
        ))
        .layer(cors_layer(&state.config.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allowed_origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        layer.allow_origin(origins)
    }
}

async fn health_check() -> &'static str {
    "OK"
}
