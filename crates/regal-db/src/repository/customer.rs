//! # Customer Repository
//!
//! Database operations for customers. Plain CRUD; invoices reference
//! customers nullably so walk-in sales never need a row here.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use regal_core::{validation, Customer};

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a new customer.
    pub async fn insert(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
        address: Option<&str>,
    ) -> DbResult<Customer> {
        validation::validate_name(name).map_err(regal_core::CoreError::from)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            phone: phone.map(str::to_string),
            email: email.map(str::to_string),
            address: address.map(str::to_string),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %customer.id, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (id, name, phone, email, address, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, address, is_active, created_at, updated_at
            FROM customers
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Lists active customers sorted by name.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT id, name, phone, email, address, is_active, created_at, updated_at
            FROM customers
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Updates a customer's contact details.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
        address: Option<&str>,
    ) -> DbResult<Customer> {
        validation::validate_name(name).map_err(regal_core::CoreError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, address = ?5, updated_at = ?6
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(phone)
        .bind(email)
        .bind(address)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Soft-deletes a customer. Historical invoices keep referencing the row.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE customers SET is_active = 0, updated_at = ?2 WHERE id = ?1 AND is_active = 1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_customer_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let customer = repo
            .insert("Ada Lovelace", Some("+1-555-0100"), None, None)
            .await
            .unwrap();

        let fetched = repo.get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ada Lovelace");

        let updated = repo
            .update(
                &customer.id,
                "Ada King",
                Some("+1-555-0100"),
                Some("ada@example.com"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada King");
        assert_eq!(updated.email.as_deref(), Some("ada@example.com"));

        repo.soft_delete(&customer.id).await.unwrap();
        assert!(repo.list(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db
            .customers()
            .insert("   ", None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }
}
