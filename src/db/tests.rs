#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::models::{ComparisonMode, ExtractedItem, WorkflowStatus};

    async fn test_db(dir: &tempfile::TempDir) -> Database {
        Database::new(dir.path().join("test.db").to_str().unwrap())
            .await
            .expect("database")
    }

    fn sample_item(part_number: &str) -> ExtractedItem {
        ExtractedItem {
            material_name: "Silicone Grease".to_string(),
            part_number: part_number.to_string(),
            qty: "5".to_string(),
            uom: "EA".to_string(),
            vendor_name: "Acme".to_string(),
            description: "High temp grease".to_string(),
            qa_classification_label: "1".to_string(),
            qa_confidence_level: "high".to_string(),
            reasoning: "Match to BOM & Item Master Data".to_string(),
            action_path: "Auto-Register".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_workflow() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;

        db.create_workflow("wf-1", ComparisonMode::Full, "uploads/wf-1/wi.txt", Some("uploads/wf-1/master.csv"))
            .await
            .expect("create");

        let workflow = db.get_workflow("wf-1").await.expect("get").expect("row");
        assert_eq!(workflow.status, WorkflowStatus::Queued);
        assert_eq!(workflow.progress, 0);
        assert_eq!(workflow.comparison_mode, ComparisonMode::Full);
        assert_eq!(workflow.item_master_path.as_deref(), Some("uploads/wf-1/master.csv"));

        assert!(db.get_workflow("missing").await.expect("get").is_none());
        assert_eq!(db.get_all_workflows().await.expect("all").len(), 1);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::KbOnly, "wi.txt", None)
            .await
            .expect("create");

        db.update_workflow_status("wf-1", WorkflowStatus::Processing, Some(30), Some("translating"), "Translating")
            .await
            .expect("update");
        // A stale lower progress value must not move the workflow backwards.
        db.update_workflow_status("wf-1", WorkflowStatus::Processing, Some(10), Some("extracting"), "Extracting")
            .await
            .expect("update");

        let workflow = db.get_workflow("wf-1").await.expect("get").expect("row");
        assert_eq!(workflow.progress, 30);

        // Error transitions omit progress and leave it untouched.
        db.update_workflow_status("wf-1", WorkflowStatus::Error, None, None, "Processing failed: boom")
            .await
            .expect("update");
        let workflow = db.get_workflow("wf-1").await.expect("get").expect("row");
        assert_eq!(workflow.status, WorkflowStatus::Error);
        assert_eq!(workflow.progress, 30);
        assert_eq!(workflow.stage, "translating");
    }

    #[tokio::test]
    async fn test_approve_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::Full, "wi.txt", None)
            .await
            .expect("create");

        let payload = serde_json::to_string(&sample_item("PN-100")).expect("json");
        let item_id = db.add_pending_item("wf-1", &payload).await.expect("pending");

        let first = db.approve_items("wf-1", &[item_id]).await.expect("approve");
        assert_eq!(first, 1);

        // Second identical call: no error, nothing newly approved, and the
        // knowledge base still holds exactly one corresponding entry.
        let second = db.approve_items("wf-1", &[item_id]).await.expect("approve");
        assert_eq!(second, 0);

        let items = db.search_knowledge_base("PN-100", 10).await.expect("search");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].part_number, "PN-100");
        assert_eq!(items[0].source_workflow_id, "wf-1");
    }

    #[tokio::test]
    async fn test_reject_removes_from_pending_without_publishing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::Full, "wi.txt", None)
            .await
            .expect("create");

        let payload = serde_json::to_string(&sample_item("PN-200")).expect("json");
        let item_id = db.add_pending_item("wf-1", &payload).await.expect("pending");
        assert_eq!(db.get_pending_approvals().await.expect("pending").len(), 1);

        assert_eq!(db.reject_items("wf-1", &[item_id]).await.expect("reject"), 1);
        assert_eq!(db.reject_items("wf-1", &[item_id]).await.expect("reject"), 0);

        assert!(db.get_pending_approvals().await.expect("pending").is_empty());
        assert!(db.search_knowledge_base("PN-200", 10).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn test_approval_scoped_to_workflow() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::Full, "wi.txt", None)
            .await
            .expect("create");

        let payload = serde_json::to_string(&sample_item("PN-300")).expect("json");
        let item_id = db.add_pending_item("wf-1", &payload).await.expect("pending");

        // Approving under the wrong workflow id affects nothing.
        assert_eq!(db.approve_items("other", &[item_id]).await.expect("approve"), 0);
        assert_eq!(db.get_pending_approvals().await.expect("pending").len(), 1);
    }

    #[tokio::test]
    async fn test_knowledge_base_stats_and_search() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::Full, "wi.txt", None)
            .await
            .expect("create");

        let a = db
            .add_pending_item("wf-1", &serde_json::to_string(&sample_item("PN-1")).unwrap())
            .await
            .expect("pending");
        let _b = db
            .add_pending_item("wf-1", &serde_json::to_string(&sample_item("PN-2")).unwrap())
            .await
            .expect("pending");

        db.approve_items("wf-1", &[a]).await.expect("approve");

        let stats = db.knowledge_base_stats().await.expect("stats");
        assert_eq!(stats.total_items, 1);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.vendor_count, 1);

        // Empty query lists everything up to the limit.
        assert_eq!(db.search_knowledge_base("", 10).await.expect("search").len(), 1);
        assert!(db.search_knowledge_base("no-such-part", 10).await.expect("search").is_empty());
    }

    #[tokio::test]
    async fn test_results_row_upserts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = test_db(&dir).await;
        db.create_workflow("wf-1", ComparisonMode::Full, "wi.txt", None)
            .await
            .expect("create");

        db.save_workflow_results("wf-1", "{\"matches\":[]}", "{\"total_materials\":0}")
            .await
            .expect("save");
        db.save_workflow_results("wf-1", "{\"matches\":[{}]}", "{\"total_materials\":1}")
            .await
            .expect("save");

        let (results, summary) = db
            .get_workflow_results_row("wf-1")
            .await
            .expect("query")
            .expect("row");
        assert_eq!(results, "{\"matches\":[{}]}");
        assert_eq!(summary, "{\"total_materials\":1}");

        assert!(db.get_workflow_results_row("missing").await.expect("query").is_none());
    }
}
