// Server-rendered pages
// Uses Askama templates; guarded pages call `require_session` first.

mod templates;

use askama::Template;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::api::auth::require_session;
use crate::api::error::ApiError;
use crate::db;
use crate::AppState;

pub use templates::*;

fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

// Helper to render templates and handle errors
fn render_template<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// Login form, optionally with an error banner
pub fn login_page(status: StatusCode, error: Option<String>) -> Response {
    render_template(
        status,
        LoginTemplate {
            error,
            version: version(),
        },
    )
}

/// Registration form, optionally with an error banner
pub fn register_page(status: StatusCode, error: Option<String>) -> Response {
    render_template(
        status,
        RegisterTemplate {
            error,
            version: version(),
        },
    )
}

// GET /
pub async fn index() -> Redirect {
    Redirect::to("/login")
}

// GET /auth
pub async fn auth_home(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let claims = match require_session(&state, jar) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    render_template(
        StatusCode::OK,
        HomeTemplate {
            username: claims.user,
            version: version(),
        },
    )
}

// GET /:user
pub async fn user_page(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let claims = match require_session(&state, jar) {
        Ok(claims) => claims,
        Err(response) => return Ok(response),
    };

    if claims.user != user {
        return Err(ApiError::forbidden("You can only view your own products"));
    }

    let user_id = db::find_user_id(&state.db, &user)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", user)))?;
    let products = db::list_products_for_user(&state.db, user_id).await?;

    Ok(render_template(
        StatusCode::OK,
        UserProductsTemplate {
            username: user,
            products,
            version: version(),
        },
    ))
}

// GET /admin/:user
pub async fn admin_page(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    let account = db::find_user_by_username(&state.db, &user)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("User '{}' not found", user)))?;

    if !account.is_admin() {
        return Err(ApiError::forbidden("Admin role required"));
    }

    let products = db::list_products(&state.db).await?;
    let orders = db::list_orders(&state.db).await?;

    Ok(render_template(
        StatusCode::OK,
        AdminTemplate {
            username: account.username,
            products,
            orders,
            version: version(),
        },
    ))
}
