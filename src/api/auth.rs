use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::db::{create_user, find_user_by_username, DEFAULT_ROLE};
use crate::ui;
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};

/// Cookie carrying the signed session token
pub const TOKEN_COOKIE: &str = "token";
/// Cookie carrying the logged-in session flag
pub const SESSION_FLAG_COOKIE: &str = "logged_in";

/// Usernames that would shadow a fixed route when used as `/<user>`
const RESERVED_USERNAMES: &[&str] = &[
    "admin", "api-docs", "auth", "health", "login", "logout", "order", "orders", "product",
    "products", "register",
];

/// Claims embedded in every session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to
    pub user: String,
    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
}

/// What the guard found in the request's token cookie
#[derive(Debug, Clone, PartialEq)]
pub enum TokenState {
    Valid(Claims),
    Expired,
    Invalid,
    Absent,
}

/// Form body of the login and registration pages
#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Sign a token for `user` that expires `ttl_seconds` after `now`.
pub fn issue_token(
    user: &str,
    secret: &str,
    ttl_seconds: u64,
    now: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
    let claims = Claims {
        user: user.to_string(),
        exp: now.saturating_add(ttl),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Classify a token cookie value. A token is expired once `now` reaches `exp`.
pub fn inspect_token(token: Option<&str>, secret: &str, now: i64) -> TokenState {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return TokenState::Absent,
    };

    // Expiry is compared against `now` below so callers control the clock.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    match decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation) {
        Ok(data) if data.claims.exp <= now => TokenState::Expired,
        Ok(data) => TokenState::Valid(data.claims),
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => TokenState::Expired,
            _ => TokenState::Invalid,
        },
    }
}

fn token_cookie(token: String, auth: &AuthConfig) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(auth.secure_cookies)
        .same_site(SameSite::Strict)
        .build()
}

fn session_flag_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_FLAG_COOKIE, "true"))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, "")).path("/").build()
}

/// Guard for page handlers. Returns the token's claims, or the response the
/// caller must send instead of running its handler.
///
/// * no token: the login page is served in place
/// * expired token: session flag and token cookie cleared, redirect to `/login`
/// * invalid token: session flag cleared, redirect to `/login`
pub fn require_session(state: &AppState, jar: CookieJar) -> Result<Claims, Response> {
    let token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());
    let now = chrono::Utc::now().timestamp();

    match inspect_token(token.as_deref(), &state.config.auth.secret_key, now) {
        TokenState::Valid(claims) => Ok(claims),
        TokenState::Absent => {
            let jar = jar.remove(removal(SESSION_FLAG_COOKIE));
            Err((jar, ui::login_page(StatusCode::OK, None)).into_response())
        }
        TokenState::Expired => {
            info!("Rejected expired session token");
            let jar = jar
                .remove(removal(SESSION_FLAG_COOKIE))
                .remove(removal(TOKEN_COOKIE));
            Err((jar, Redirect::to("/login")).into_response())
        }
        TokenState::Invalid => {
            warn!("Rejected session token with invalid signature");
            let jar = jar.remove(removal(SESSION_FLAG_COOKIE));
            Err((jar, Redirect::to("/login")).into_response())
        }
    }
}

/// Pull both fields out of a submitted form, rejecting missing or empty ones.
fn require_credentials(form: Option<Form<Credentials>>) -> Result<(String, String), ApiError> {
    let Credentials { username, password } = form.map(|Form(c)| c).unwrap_or_default();
    let username = username.map(|u| u.trim().to_string()).unwrap_or_default();
    let password = password.unwrap_or_default();

    let mut errors = ValidationErrorBuilder::new();
    if username.is_empty() {
        errors.add("username", "Username is required");
    }
    if password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    Ok((username, password))
}

/// Usernames become a path segment, so keep them to a URL-safe alphabet.
fn validate_username(username: &str) -> Result<(), String> {
    if username.len() > 64 {
        return Err("Username is too long (max 64 characters)".to_string());
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err("Username may only contain letters, digits, '_', '-' and '.'".to_string());
    }
    if RESERVED_USERNAMES.contains(&username.to_ascii_lowercase().as_str()) {
        return Err("Username is reserved".to_string());
    }
    Ok(())
}

/// GET /register
pub async fn register_page() -> Response {
    ui::register_page(StatusCode::OK, None)
}

/// POST /register
pub async fn register(
    State(state): State<Arc<AppState>>,
    form: Option<Form<Credentials>>,
) -> Result<Response, ApiError> {
    let (username, password) = require_credentials(form)?;

    if let Err(e) = validate_username(&username) {
        let mut errors = ValidationErrorBuilder::new();
        errors.add("username", e);
        errors.finish()?;
    }

    let password_hash = hash_password(&password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    create_user(&state.db, &username, &password_hash, DEFAULT_ROLE).await?;

    info!(username = %username, "User registered");
    Ok(Redirect::to("/login").into_response())
}

/// GET /login
pub async fn login_page() -> Response {
    ui::login_page(StatusCode::OK, None)
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    form: Option<Form<Credentials>>,
) -> Result<Response, ApiError> {
    let (username, password) = require_credentials(form)?;

    let user = find_user_by_username(&state.db, &username).await?;
    let user = match user {
        Some(user) if verify_password(&password, &user.password_hash) => user,
        _ => {
            warn!(username = %username, "Failed login attempt");
            return Ok(ui::login_page(StatusCode::UNAUTHORIZED, None));
        }
    };

    let auth = &state.config.auth;
    let token = issue_token(
        &user.username,
        &auth.secret_key,
        auth.token_ttl_seconds,
        chrono::Utc::now().timestamp(),
    )
    .map_err(|e| ApiError::internal(format!("Failed to sign token: {}", e)))?;

    let jar = jar
        .add(session_flag_cookie())
        .add(token_cookie(token, auth));

    info!(username = %user.username, "User logged in");
    Ok((jar, Redirect::to(&format!("/{}", user.username))).into_response())
}

/// GET /logout
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(removal(SESSION_FLAG_COOKIE))
        .remove(removal(TOKEN_COOKIE));
    (jar, Redirect::to("/login"))
}
