//! Product model, request payloads and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: f64,
    /// Owning user, absent for imported or legacy rows
    pub user_id: Option<i64>,
}

/// Body of product create and update requests
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ProductPayload {
    pub name: String,
    pub price: f64,
}

pub async fn create_product(
    db: &SqlitePool,
    payload: &ProductPayload,
    user_id: Option<i64>,
) -> Result<Product, sqlx::Error> {
    let result = sqlx::query("INSERT INTO products (name, price, user_id) VALUES (?, ?, ?)")
        .bind(&payload.name)
        .bind(payload.price)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(Product {
        id: result.last_insert_rowid(),
        name: payload.name.clone(),
        price: payload.price,
        user_id,
    })
}

pub async fn list_products(db: &SqlitePool) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products ORDER BY id")
        .fetch_all(db)
        .await
}

/// Products owned by one user
pub async fn list_products_for_user(
    db: &SqlitePool,
    user_id: i64,
) -> Result<Vec<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE user_id = ? ORDER BY id")
        .bind(user_id)
        .fetch_all(db)
        .await
}

pub async fn get_product(db: &SqlitePool, id: i64) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Returns the number of rows touched; zero when the id does not exist.
pub async fn update_product(
    db: &SqlitePool,
    id: i64,
    payload: &ProductPayload,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE products SET name = ?, price = ? WHERE id = ?")
        .bind(&payload.name)
        .bind(payload.price)
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

/// Returns the number of rows removed; zero when the id does not exist.
pub async fn delete_product(db: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM products WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}
