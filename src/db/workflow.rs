use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use tracing::{debug, instrument};

use super::core::Database;
use crate::db::Row;
use crate::models::{ComparisonMode, Workflow, WorkflowStatus};
use crate::TARGET_DB;

fn workflow_from_row(row: &SqliteRow) -> Workflow {
    let comparison_mode: String = row.get("comparison_mode");
    let status: String = row.get("status");
    Workflow {
        id: row.get("id"),
        status: WorkflowStatus::parse(&status),
        progress: row.get("progress"),
        stage: row.get("stage"),
        message: row.get("message"),
        comparison_mode: ComparisonMode::parse(&comparison_mode).unwrap_or(ComparisonMode::KbOnly),
        wi_path: row.get("wi_path"),
        item_master_path: row.get("item_master_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

impl Database {
    /// Record a newly submitted workflow in the `queued` state.
    #[instrument(target = "db_query", level = "info", skip(self))]
    pub async fn create_workflow(
        &self,
        id: &str,
        comparison_mode: ComparisonMode,
        wi_path: &str,
        item_master_path: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, status, progress, stage, message, comparison_mode,
                 wi_path, item_master_path, created_at, updated_at)
            VALUES (?1, 'queued', 0, '', 'Workflow accepted', ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(id)
        .bind(comparison_mode.as_str())
        .bind(wi_path)
        .bind(item_master_path)
        .bind(&now)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Created workflow {}", id);
        Ok(())
    }

    /// Persist a state transition. Progress only ever moves forward: the
    /// stored value is the max of the current and requested progress, and an
    /// omitted progress (error transitions) leaves it untouched.
    #[instrument(target = "db_query", level = "debug", skip(self, message))]
    pub async fn update_workflow_status(
        &self,
        id: &str,
        status: WorkflowStatus,
        progress: Option<i64>,
        stage: Option<&str>,
        message: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE workflows
            SET status = ?2,
                progress = MAX(progress, COALESCE(?3, progress)),
                stage = COALESCE(?4, stage),
                message = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .bind(progress)
        .bind(stage)
        .bind(message)
        .bind(&now)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Workflow {} -> {} ({:?})", id, status.as_str(), progress);
        Ok(())
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<Workflow>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM workflows WHERE id = ?1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(row.as_ref().map(workflow_from_row))
    }

    pub async fn get_all_workflows(&self) -> Result<Vec<Workflow>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM workflows ORDER BY created_at DESC")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.iter().map(workflow_from_row).collect())
    }
}
