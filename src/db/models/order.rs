//! Order model, request payloads and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Order {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub user_id: Option<i64>,
}

/// Body of order create and update requests
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderPayload {
    pub product_id: i64,
    pub quantity: i64,
}

pub async fn create_order(
    db: &SqlitePool,
    payload: &OrderPayload,
    user_id: Option<i64>,
) -> Result<Order, sqlx::Error> {
    let result = sqlx::query("INSERT INTO orders (product_id, quantity, user_id) VALUES (?, ?, ?)")
        .bind(payload.product_id)
        .bind(payload.quantity)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(Order {
        id: result.last_insert_rowid(),
        product_id: payload.product_id,
        quantity: payload.quantity,
        user_id,
    })
}

pub async fn list_orders(db: &SqlitePool) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders ORDER BY id")
        .fetch_all(db)
        .await
}

pub async fn get_order(db: &SqlitePool, id: i64) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn update_order(
    db: &SqlitePool,
    id: i64,
    payload: &OrderPayload,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE orders SET product_id = ?, quantity = ? WHERE id = ?")
        .bind(payload.product_id)
        .bind(payload.quantity)
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete_order(db: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM orders WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_product, init_memory, ProductPayload};

    async fn seed_product(db: &SqlitePool) -> i64 {
        let payload = ProductPayload {
            name: "Widget".to_string(),
            price: 9.99,
        };
        create_product(db, &payload, None).await.unwrap().id
    }

    #[tokio::test]
    async fn test_order_lifecycle() {
        let db = init_memory().await.unwrap();
        let product_id = seed_product(&db).await;

        let order = create_order(&db, &OrderPayload { product_id, quantity: 3 }, None)
            .await
            .unwrap();
        assert_eq!(list_orders(&db).await.unwrap(), vec![order.clone()]);

        let changed = update_order(&db, order.id, &OrderPayload { product_id, quantity: 5 })
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(get_order(&db, order.id).await.unwrap().unwrap().quantity, 5);

        assert_eq!(delete_order(&db, order.id).await.unwrap(), 1);
        assert!(list_orders(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_of_missing_row_touches_nothing() {
        let db = init_memory().await.unwrap();
        let product_id = seed_product(&db).await;

        let changed = update_order(&db, 404, &OrderPayload { product_id, quantity: 2 })
            .await
            .unwrap();
        assert_eq!(changed, 0);
        assert!(list_orders(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_order_requires_existing_product() {
        let db = init_memory().await.unwrap();
        let result = create_order(&db, &OrderPayload { product_id: 42, quantity: 1 }, None).await;
        assert!(result.is_err());
    }
}
