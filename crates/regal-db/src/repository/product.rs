//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Two Mutation Paths, Kept Apart
//! Product rows are written by exactly two callers that never touch the
//! same columns:
//! - the stock coordinator writes `stock_level` (and nothing else)
//! - this repository writes every other column (and never `stock_level`
//!   after insert)
//!
//! That split is what lets a price edit and a concurrent sale both succeed
//! without clobbering each other.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::apply_delta_tx;
use regal_core::{validation, Product, StockEntryKind, StockMutation};

/// Parameters for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub unit_price_cents: i64,
    pub cost_price_cents: i64,
    pub tax_rate_bps: u32,
    pub discount_bps: u32,
    /// Opening quantity. A nonzero value writes a matching `In` ledger
    /// entry so the ledger covers the product from time zero.
    pub initial_stock: i64,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product, seeding the stock ledger if an opening
    /// quantity is given.
    ///
    /// ## Errors
    /// * `Domain` - invalid sku/name/prices
    /// * `UniqueViolation` - SKU already exists
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validation::validate_sku(&new.sku).map_err(regal_core::CoreError::from)?;
        validation::validate_name(&new.name).map_err(regal_core::CoreError::from)?;
        validation::validate_price_cents("unit_price_cents", new.unit_price_cents)
            .map_err(regal_core::CoreError::from)?;
        validation::validate_price_cents("cost_price_cents", new.cost_price_cents)
            .map_err(regal_core::CoreError::from)?;
        if new.initial_stock < 0 {
            return Err(regal_core::CoreError::from(
                regal_core::ValidationError::MustBePositive {
                    field: "initial_stock".to_string(),
                },
            )
            .into());
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.trim().to_string(),
            barcode: new.barcode.clone(),
            name: new.name.trim().to_string(),
            description: new.description.clone(),
            unit_price_cents: new.unit_price_cents,
            cost_price_cents: new.cost_price_cents,
            tax_rate_bps: new.tax_rate_bps,
            discount_bps: new.discount_bps,
            stock_level: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, description,
                unit_price_cents, cost_price_cents, tax_rate_bps, discount_bps,
                stock_level, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.unit_price_cents)
        .bind(product.cost_price_cents)
        .bind(product.tax_rate_bps)
        .bind(product.discount_bps)
        .bind(product.stock_level)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut created = product;

        if new.initial_stock > 0 {
            let mutation = StockMutation::new(&created.id, new.initial_stock, StockEntryKind::In)
                .with_reference(format!("product:{}:initial", created.sku));
            let (_, qty) = apply_delta_tx(&mut tx, &mutation).await?;
            created.stock_level = qty;
        }

        tx.commit().await?;

        Ok(created)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, barcode, name, description,
                   unit_price_cents, cost_price_cents, tax_rate_bps, discount_bps,
                   stock_level, is_active, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, barcode, name, description,
                   unit_price_cents, cost_price_cents, tax_rate_bps, discount_bps,
                   stock_level, is_active, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products sorted by name.
    pub async fn list(&self, limit: i64, offset: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, sku, barcode, name, description,
                   unit_price_cents, cost_price_cents, tax_rate_bps, discount_bps,
                   stock_level, is_active, created_at, updated_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates an existing product's descriptive fields.
    ///
    /// `stock_level` is deliberately absent from the statement: quantity
    /// changes go through the stock coordinator.
    #[allow(clippy::too_many_arguments)]
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        description: Option<&str>,
        barcode: Option<&str>,
        unit_price_cents: i64,
        cost_price_cents: i64,
        tax_rate_bps: u32,
        discount_bps: u32,
    ) -> DbResult<Product> {
        validation::validate_name(name).map_err(regal_core::CoreError::from)?;
        validation::validate_price_cents("unit_price_cents", unit_price_cents)
            .map_err(regal_core::CoreError::from)?;
        validation::validate_price_cents("cost_price_cents", cost_price_cents)
            .map_err(regal_core::CoreError::from)?;

        debug!(id = %id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                description = ?3,
                barcode = ?4,
                unit_price_cents = ?5,
                cost_price_cents = ?6,
                tax_rate_bps = ?7,
                discount_bps = ?8,
                updated_at = ?9
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(name.trim())
        .bind(description)
        .bind(barcode)
        .bind(unit_price_cents)
        .bind(cost_price_cents)
        .bind(tax_rate_bps)
        .bind(discount_bps)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// ## Why Soft Delete?
    /// Historical invoices and ledger entries still reference this product.
    /// The row stays so cancellations of old sales can restore quantity.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET is_active = 0, updated_at = ?2
            WHERE id = ?1 AND is_active = 1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
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

    fn new_product(sku: &str, stock: i64) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            barcode: None,
            name: format!("Test {sku}"),
            description: None,
            unit_price_cents: 1099,
            cost_price_cents: 750,
            tax_rate_bps: 825,
            discount_bps: 0,
            initial_stock: stock,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert(&new_product("COKE-330", 12)).await.unwrap();
        assert_eq!(product.stock_level, 12);

        let fetched = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(fetched.sku, "COKE-330");
        assert_eq!(fetched.stock_level, 12);

        let by_sku = repo.get_by_sku("COKE-330").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);
    }

    #[tokio::test]
    async fn test_initial_stock_seeds_the_ledger() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let product = db
            .products()
            .insert(&new_product("COKE-330", 12))
            .await
            .unwrap();

        assert_eq!(db.stock().ledger_total(&product.id).await.unwrap(), 12);

        let entries = db
            .stock()
            .list_entries(Some(&product.id), 10, 0)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].qty_delta, 12);
        assert_eq!(
            entries[0].reference.as_deref(),
            Some("product:COKE-330:initial")
        );
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.insert(&new_product("COKE-330", 0)).await.unwrap();
        let err = repo.insert(&new_product("COKE-330", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_leaves_stock_alone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert(&new_product("COKE-330", 7)).await.unwrap();

        let updated = repo
            .update(
                &product.id,
                "Coca-Cola 330ml",
                Some("can"),
                Some("5449000000996"),
                1199,
                800,
                825,
                500,
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Coca-Cola 330ml");
        assert_eq!(updated.unit_price_cents, 1199);
        assert_eq!(updated.stock_level, 7);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_but_keeps_row() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let product = repo.insert(&new_product("COKE-330", 0)).await.unwrap();
        repo.soft_delete(&product.id).await.unwrap();

        let fetched = repo.get_by_id(&product.id).await.unwrap().unwrap();
        assert!(!fetched.is_active);

        assert!(repo.list(10, 0).await.unwrap().is_empty());

        // Second delete is a not-found.
        let err = repo.soft_delete(&product.id).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_validates_input() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        let mut bad_sku = new_product("BAD SKU", 0);
        bad_sku.sku = "BAD SKU".to_string();
        assert!(matches!(
            repo.insert(&bad_sku).await.unwrap_err(),
            DbError::Domain(_)
        ));

        let mut negative_price = new_product("OK-SKU", 0);
        negative_price.unit_price_cents = -1;
        assert!(matches!(
            repo.insert(&negative_price).await.unwrap_err(),
            DbError::Domain(_)
        ));
    }
}
