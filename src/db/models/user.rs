//! User model and credential lookups.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Role assigned to every self-registered account
pub const DEFAULT_ROLE: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: String,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == DEFAULT_ROLE
    }
}

/// Insert a user row and return its id
pub async fn create_user(
    db: &SqlitePool,
    username: &str,
    password_hash: &str,
    role: &str,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query("INSERT INTO users (username, password_hash, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .execute(db)
        .await?;

    Ok(result.last_insert_rowid())
}

pub async fn find_user_by_username(
    db: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await
}

/// Resolve a username to its numeric id
pub async fn find_user_id(db: &SqlitePool, username: &str) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = init_memory().await.unwrap();
        let id = create_user(&db, "alice", "hash", DEFAULT_ROLE).await.unwrap();

        let user = find_user_by_username(&db, "alice").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.password_hash, "hash");
        assert!(user.is_admin());

        assert_eq!(find_user_id(&db, "alice").await.unwrap(), Some(id));
        assert_eq!(find_user_id(&db, "bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = init_memory().await.unwrap();
        create_user(&db, "alice", "h1", DEFAULT_ROLE).await.unwrap();

        let err = create_user(&db, "alice", "h2", DEFAULT_ROLE).await.unwrap_err();
        match err {
            sqlx::Error::Database(db_err) => {
                assert!(db_err.message().contains("UNIQUE constraint failed"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_other_roles_are_not_admin() {
        let db = init_memory().await.unwrap();
        create_user(&db, "carol", "hash", "viewer").await.unwrap();

        let user = find_user_by_username(&db, "carol").await.unwrap().unwrap();
        assert_eq!(user.role, "viewer");
        assert!(!user.is_admin());
    }
}
