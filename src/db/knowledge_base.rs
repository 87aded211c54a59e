use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, instrument, warn};

use super::core::Database;
use crate::db::Row;
use crate::models::{ExtractedItem, KnowledgeBaseItem, KnowledgeBaseStats, PendingApproval};
use crate::TARGET_DB;

fn pending_from_row(row: &SqliteRow) -> PendingApproval {
    let item_data: String = row.get("item_data");
    PendingApproval {
        id: row.get("id"),
        workflow_id: row.get("workflow_id"),
        item: serde_json::from_str(&item_data).unwrap_or(serde_json::Value::Null),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn kb_item_from_row(row: &SqliteRow) -> KnowledgeBaseItem {
    KnowledgeBaseItem {
        id: row.get("id"),
        material_name: row.get("material_name"),
        part_number: row.get("part_number"),
        description: row.get("description"),
        vendor_name: row.get("vendor_name"),
        uom: row.get("uom"),
        source_workflow_id: row.get("source_workflow_id"),
        approved_at: row.get("approved_at"),
    }
}

impl Database {
    /// Queue one classified item for human approval.
    #[instrument(target = "db_query", level = "debug", skip(self, item_data))]
    pub async fn add_pending_item(
        &self,
        workflow_id: &str,
        item_data: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(
            r#"
            INSERT INTO pending_approvals (workflow_id, item_data, status, created_at, updated_at)
            VALUES (?1, ?2, 'pending', ?3, ?3)
            RETURNING id
            "#,
        )
        .bind(workflow_id)
        .bind(item_data)
        .bind(&now)
        .fetch_one(self.pool())
        .await?;
        Ok(row.get("id"))
    }

    pub async fn get_pending_approvals(&self) -> Result<Vec<PendingApproval>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM pending_approvals WHERE status = 'pending' ORDER BY created_at",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(pending_from_row).collect())
    }

    /// Approve pending items, publishing each into the knowledge base.
    /// Idempotent: an id that is not in the `pending` state is skipped, so
    /// repeating a call reports 0 newly approved and inserts nothing.
    #[instrument(target = "db_query", level = "info", skip(self, item_ids))]
    pub async fn approve_items(
        &self,
        workflow_id: &str,
        item_ids: &[i64],
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut approved = 0u64;

        for item_id in item_ids {
            let mut tx = self.pool().begin().await?;

            // Flip pending -> approved; anything already decided is a no-op.
            let row = sqlx::query(
                r#"
                UPDATE pending_approvals
                SET status = 'approved', updated_at = ?3
                WHERE id = ?1 AND workflow_id = ?2 AND status = 'pending'
                RETURNING item_data
                "#,
            )
            .bind(item_id)
            .bind(workflow_id)
            .bind(&now)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(row) = row else {
                tx.rollback().await?;
                debug!(target: TARGET_DB, "Pending item {} not approvable (missing or already decided)", item_id);
                continue;
            };

            let item_data: String = row.get("item_data");
            let item: ExtractedItem = match serde_json::from_str(&item_data) {
                Ok(item) => item,
                Err(e) => {
                    warn!(target: TARGET_DB, "Pending item {} holds unparseable payload: {}", item_id, e);
                    tx.rollback().await?;
                    continue;
                }
            };

            sqlx::query(
                r#"
                INSERT INTO knowledge_base
                    (material_name, part_number, description, vendor_name, uom,
                     source_workflow_id, approved_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&item.material_name)
            .bind(&item.part_number)
            .bind(&item.description)
            .bind(&item.vendor_name)
            .bind(&item.uom)
            .bind(workflow_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            approved += 1;
        }

        debug!(target: TARGET_DB, "Approved {} item(s) for workflow {}", approved, workflow_id);
        Ok(approved)
    }

    /// Reject pending items. Idempotent like approval; rejected items never
    /// reach the knowledge base.
    #[instrument(target = "db_query", level = "info", skip(self, item_ids))]
    pub async fn reject_items(
        &self,
        workflow_id: &str,
        item_ids: &[i64],
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let mut rejected = 0u64;

        for item_id in item_ids {
            let result = sqlx::query(
                r#"
                UPDATE pending_approvals
                SET status = 'rejected', updated_at = ?3
                WHERE id = ?1 AND workflow_id = ?2 AND status = 'pending'
                "#,
            )
            .bind(item_id)
            .bind(workflow_id)
            .bind(&now)
            .execute(self.pool())
            .await?;
            rejected += result.rows_affected();
        }

        debug!(target: TARGET_DB, "Rejected {} item(s) for workflow {}", rejected, workflow_id);
        Ok(rejected)
    }

    /// Case-insensitive substring search over the approved knowledge base.
    /// An empty query returns the most recently approved entries.
    pub async fn search_knowledge_base(
        &self,
        query: &str,
        limit: i64,
    ) -> Result<Vec<KnowledgeBaseItem>, sqlx::Error> {
        let pattern = format!("%{}%", query);
        let rows = sqlx::query(
            r#"
            SELECT * FROM knowledge_base
            WHERE material_name LIKE ?1
               OR part_number LIKE ?1
               OR description LIKE ?1
               OR vendor_name LIKE ?1
            ORDER BY approved_at DESC
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.iter().map(kb_item_from_row).collect())
    }

    pub async fn knowledge_base_stats(&self) -> Result<KnowledgeBaseStats, sqlx::Error> {
        let total_items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_base")
            .fetch_one(self.pool())
            .await?;
        let pending_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pending_approvals WHERE status = 'pending'")
                .fetch_one(self.pool())
                .await?;
        let vendor_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT vendor_name) FROM knowledge_base WHERE vendor_name != ''",
        )
        .fetch_one(self.pool())
        .await?;
        Ok(KnowledgeBaseStats {
            total_items,
            pending_count,
            vendor_count,
        })
    }
}
