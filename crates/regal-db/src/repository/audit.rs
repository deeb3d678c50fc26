//! # Audit Log Repository
//!
//! Fire-and-forget records of "who changed what".
//!
//! The write path is deliberately infallible from the caller's point of
//! view: [`AuditRepository::record`] logs failures at `warn` and returns
//! nothing, so a lost audit row can never roll back or fail the business
//! operation it describes.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

use crate::error::DbResult;
use regal_core::AuditEntry;

/// Repository for the audit log.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Records an audit entry. Never fails the caller.
    pub async fn record(
        &self,
        user_id: &str,
        entity: &str,
        entity_id: &str,
        action: &str,
        details: Option<serde_json::Value>,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            entity: entity.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            details: details.map(|d| d.to_string()),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO audit_log (id, user_id, entity, entity_id, action, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(&entry.entity)
        .bind(&entry.entity_id)
        .bind(&entry.action)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(
                entity = %entry.entity,
                entity_id = %entry.entity_id,
                action = %entry.action,
                error = %e,
                "Failed to write audit entry, continuing"
            );
        }
    }

    /// Lists audit entries for one entity, newest first.
    pub async fn list_for_entity(
        &self,
        entity: &str,
        entity_id: &str,
        limit: i64,
    ) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, user_id, entity, entity_id, action, details, created_at
            FROM audit_log
            WHERE entity = ?1 AND entity_id = ?2
            ORDER BY created_at DESC
            LIMIT ?3
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Lists recent audit entries across all entities, newest first.
    pub async fn list_recent(&self, limit: i64, offset: i64) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            r#"
            SELECT id, user_id, entity, entity_id, action, details, created_at
            FROM audit_log
            ORDER BY created_at DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();

        audit
            .record(
                "user-1",
                "Invoice",
                "inv-1",
                "CREATE",
                Some(json!({"invoiceNo": "INV-20260808-AAAA1111"})),
            )
            .await;
        audit.record("user-1", "Invoice", "inv-1", "DELETE", None).await;

        let entries = audit.list_for_entity("Invoice", "inv-1", 10).await.unwrap();
        assert_eq!(entries.len(), 2);

        let recent = audit.list_recent(10, 0).await.unwrap();
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_record_failure_does_not_panic() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let audit = db.audit();
        db.close().await;

        // Pool is closed: the insert fails, the caller never notices.
        audit.record("user-1", "Invoice", "inv-1", "CREATE", None).await;
    }
}
