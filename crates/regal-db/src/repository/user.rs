//! # User Repository
//!
//! Database operations for staff accounts. Password hashing happens in the
//! server's auth module; this repository only ever sees the finished hash.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use regal_core::{validation, Role, User};

/// Parameters for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    /// Argon2 PHC string, produced by the caller.
    pub password_hash: String,
    pub role: Role,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts a new user.
    pub async fn insert(&self, new: &NewUser) -> DbResult<User> {
        validation::validate_username(&new.username).map_err(regal_core::CoreError::from)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: new.username.trim().to_string(),
            password_hash: new.password_hash.clone(),
            role: new.role,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(username = %user.username, role = ?user.role, "Inserting user");

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets a user by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Gets an active user by username (login path).
    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE username = ?1 AND is_active = 1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Lists users sorted by username.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, password_hash, role, is_active, created_at, updated_at
            FROM users
            WHERE is_active = 1
            ORDER BY username
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Changes a user's role.
    pub async fn set_role(&self, id: &str, role: Role) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE users SET role = ?2, updated_at = ?3 WHERE id = ?1 AND is_active = 1")
                .bind(id)
                .bind(role)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Replaces a user's password hash.
    pub async fn set_password_hash(&self, id: &str, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Deactivates a user account (soft delete).
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    /// Counts active users. Used at startup to decide whether to
    /// bootstrap the admin account.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn new_user(username: &str, role: Role) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "$argon2id$fake-hash".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        assert_eq!(repo.count().await.unwrap(), 0);

        let user = repo.insert(&new_user("alice", Role::Cashier)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_name.role, Role::Cashier);

        repo.set_role(&user.id, Role::Manager).await.unwrap();
        let promoted = repo.get_by_id(&user.id).await.unwrap().unwrap();
        assert_eq!(promoted.role, Role::Manager);

        repo.soft_delete(&user.id).await.unwrap();
        assert!(repo.get_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.users();

        repo.insert(&new_user("alice", Role::Cashier)).await.unwrap();
        let err = repo
            .insert(&new_user("alice", Role::Admin))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }
}
