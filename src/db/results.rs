use chrono::Utc;
use tracing::{debug, instrument};

use super::core::Database;
use crate::db::Row;
use crate::TARGET_DB;

impl Database {
    /// Mirror the results artifact into the database. A single upsert keeps
    /// the matches and summary together so a workflow can never be observed
    /// completed with half its results missing.
    #[instrument(target = "db_query", level = "info", skip(self, results_data, summary_data))]
    pub async fn save_workflow_results(
        &self,
        workflow_id: &str,
        results_data: &str,
        summary_data: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO workflow_results (workflow_id, results_data, summary_data, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(workflow_id) DO UPDATE SET
                results_data = excluded.results_data,
                summary_data = excluded.summary_data
            "#,
        )
        .bind(workflow_id)
        .bind(results_data)
        .bind(summary_data)
        .bind(&now)
        .execute(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Saved results row for workflow {}", workflow_id);
        Ok(())
    }

    pub async fn get_workflow_results_row(
        &self,
        workflow_id: &str,
    ) -> Result<Option<(String, String)>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT results_data, summary_data FROM workflow_results WHERE workflow_id = ?1",
        )
        .bind(workflow_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(|r| (r.get("results_data"), r.get("summary_data"))))
    }
}
