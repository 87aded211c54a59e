use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::models::WorkflowJob;
use crate::pipeline::PipelineContext;
use crate::TARGET_WORKFLOW;

/// Submissions beyond this depth wait for a slot instead of being dropped.
pub const QUEUE_CAPACITY: usize = 64;

/// Submission handle for the workflow worker pool: a bounded job channel
/// consumed by a fixed number of worker tasks. Each job runs start to
/// finish on one worker; excess submissions queue in arrival order.
#[derive(Clone)]
pub struct WorkflowQueue {
    tx: mpsc::Sender<WorkflowJob>,
}

impl WorkflowQueue {
    /// Spawns `worker_count` workers sharing one bounded channel and
    /// returns the handle used to enqueue jobs.
    pub fn start(ctx: PipelineContext, worker_count: usize) -> WorkflowQueue {
        let (tx, rx) = mpsc::channel::<WorkflowJob>(QUEUE_CAPACITY);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let ctx = ctx.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, ctx, rx).await;
            });
        }

        WorkflowQueue { tx }
    }

    /// Hand a job to the pool. Never blocks on pipeline completion; callers
    /// poll workflow status for progress.
    pub async fn submit(&self, job: WorkflowJob) -> Result<()> {
        self.tx
            .send(job)
            .await
            .map_err(|_| anyhow!("worker pool is not running"))
    }
}

async fn worker_loop(
    worker_id: usize,
    ctx: PipelineContext,
    rx: Arc<Mutex<mpsc::Receiver<WorkflowJob>>>,
) {
    info!(target: TARGET_WORKFLOW, "Workflow worker {} started", worker_id);
    loop {
        // The lock is held only while waiting for the next job, never while
        // processing one, so up to `worker_count` pipelines run in parallel.
        let job = rx.lock().await.recv().await;
        match job {
            Some(job) => {
                info!(target: TARGET_WORKFLOW, "Worker {} picked up workflow {}", worker_id, job.workflow_id);
                ctx.run_workflow(&job).await;
            }
            None => break,
        }
    }
    info!(target: TARGET_WORKFLOW, "Workflow worker {} stopped", worker_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ExtractionAgent;
    use crate::db::Database;
    use crate::extractor::DocumentExtractor;
    use crate::gateway::{GatewayClient, GatewayConfig};
    use crate::models::{ComparisonMode, WorkflowStatus};
    use crate::translation::Translator;
    use std::time::Duration;

    async fn test_context(dir: &std::path::Path) -> PipelineContext {
        let db = Database::new(dir.join("test.db").to_str().unwrap())
            .await
            .expect("database");
        let gateway = GatewayClient::new(
            GatewayConfig {
                url: "http://127.0.0.1:9/chat/completions".to_string(),
                model: "test-model".to_string(),
                api_key: "test-key".to_string(),
            },
            1,
        );
        let agent = ExtractionAgent::new(gateway.clone());
        PipelineContext {
            db,
            extractor: DocumentExtractor::new(agent.clone()),
            translator: Translator::new(gateway),
            agent,
            results_dir: dir.join("results"),
        }
    }

    #[tokio::test]
    async fn test_pipeline_completes_with_unreachable_gateway() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(dir.path()).await;
        let db = ctx.db.clone();

        let wi_path = dir.path().join("wi.txt");
        std::fs::write(&wi_path, "工程 1: グリスを塗布する\n").expect("write wi");

        db.create_workflow("wf-1", ComparisonMode::KbOnly, wi_path.to_str().unwrap(), None)
            .await
            .expect("create");

        let queue = WorkflowQueue::start(ctx.clone(), 2);
        queue
            .submit(WorkflowJob {
                workflow_id: "wf-1".to_string(),
                wi_path: wi_path.to_str().unwrap().to_string(),
                item_master_path: None,
                comparison_mode: ComparisonMode::KbOnly,
            })
            .await
            .expect("submit");

        // Every gateway call fails and degrades; the pipeline must still
        // run to completion with zero extracted items.
        let mut workflow = None;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let current = db.get_workflow("wf-1").await.expect("get").expect("row");
            if matches!(
                current.status,
                WorkflowStatus::Completed | WorkflowStatus::Error
            ) {
                workflow = Some(current);
                break;
            }
        }
        let workflow = workflow.expect("workflow did not finish in time");

        assert_eq!(workflow.status, WorkflowStatus::Completed);
        assert_eq!(workflow.progress, 100);
        assert_eq!(workflow.stage, "completed");

        // Results artifact exists on disk and in the mirror table.
        assert!(ctx.results_path("wf-1").exists());
        let row = db
            .get_workflow_results_row("wf-1")
            .await
            .expect("results query")
            .expect("results row");
        assert_eq!(row.0, r#"{"matches":[]}"#);

        // No items extracted, so no approvals queued.
        assert!(db.get_pending_approvals().await.expect("pending").is_empty());
    }

    #[tokio::test]
    async fn test_pipeline_errors_on_missing_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = test_context(dir.path()).await;
        let db = ctx.db.clone();

        let missing = dir.path().join("does-not-exist.txt");
        db.create_workflow("wf-2", ComparisonMode::KbOnly, missing.to_str().unwrap(), None)
            .await
            .expect("create");

        ctx.run_workflow(&WorkflowJob {
            workflow_id: "wf-2".to_string(),
            wi_path: missing.to_str().unwrap().to_string(),
            item_master_path: None,
            comparison_mode: ComparisonMode::KbOnly,
        })
        .await;

        let workflow = db.get_workflow("wf-2").await.expect("get").expect("row");
        assert_eq!(workflow.status, WorkflowStatus::Error);
        assert!(workflow.message.starts_with("Processing failed"));
        // Error transitions leave progress where it was.
        assert!(workflow.progress < 100);
        assert!(!ctx.results_path("wf-2").exists());
    }
}
