use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                stage TEXT NOT NULL DEFAULT '',
                message TEXT NOT NULL DEFAULT '',
                comparison_mode TEXT NOT NULL,
                wi_path TEXT NOT NULL,
                item_master_path TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_workflows_created_at ON workflows (created_at);

            -- Mirror of the on-disk results artifact, one row per workflow
            CREATE TABLE IF NOT EXISTS workflow_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id TEXT NOT NULL UNIQUE,
                results_data TEXT NOT NULL,
                summary_data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (workflow_id) REFERENCES workflows (id)
            );

            CREATE TABLE IF NOT EXISTS pending_approvals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                workflow_id TEXT NOT NULL,
                item_data TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (workflow_id) REFERENCES workflows (id)
            );
            CREATE INDEX IF NOT EXISTS idx_pending_approvals_workflow_status
                ON pending_approvals (workflow_id, status);
            CREATE INDEX IF NOT EXISTS idx_pending_approvals_status
                ON pending_approvals (status);

            -- Approved items feeding back into future matching
            CREATE TABLE IF NOT EXISTS knowledge_base (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                material_name TEXT NOT NULL DEFAULT '',
                part_number TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                vendor_name TEXT NOT NULL DEFAULT '',
                uom TEXT NOT NULL DEFAULT '',
                source_workflow_id TEXT NOT NULL,
                approved_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_knowledge_base_part_number
                ON knowledge_base (part_number);
            CREATE INDEX IF NOT EXISTS idx_knowledge_base_material_name
                ON knowledge_base (material_name);
            "#,
        )
        .execute(&mut *conn)
        .await?;

        info!(target: TARGET_DB, "Database schema initialized");
        Ok(())
    }
}
