use axum::extract::{Multipart, Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ApiError;
use crate::models::{ComparisonMode, WorkflowJob};
use crate::workers::WorkflowQueue;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub queue: WorkflowQueue,
    pub upload_dir: PathBuf,
    pub results_dir: PathBuf,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/workflows", post(submit_workflow).get(list_workflows))
        .route("/workflows/{id}/status", get(workflow_status))
        .route("/workflows/{id}/results", get(workflow_results))
        .route("/knowledge-base", get(knowledge_base))
        .route("/knowledge-base/pending", get(pending_approvals))
        .route("/knowledge-base/approve", post(approve_items))
        .route("/knowledge-base/reject", post(reject_items))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server running on http://{}", addr);
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Checks the submission invariants before any workflow state is created,
/// yielding the document upload itself so later code cannot run without
/// one. `full` comparison needs the item master it compares against.
fn validate_submission(
    comparison_mode: Option<&str>,
    wi_document: Option<Upload>,
    has_item_master: bool,
) -> Result<(ComparisonMode, Upload), ApiError> {
    let mode = comparison_mode
        .and_then(ComparisonMode::parse)
        .ok_or_else(|| {
            ApiError::InvalidInput("comparison_mode must be 'full' or 'kb_only'".to_string())
        })?;
    let wi_document = wi_document
        .ok_or_else(|| ApiError::InvalidInput("WI document is required".to_string()))?;
    if mode == ComparisonMode::Full && !has_item_master {
        return Err(ApiError::InvalidInput(
            "Item Master is required for full comparison mode".to_string(),
        ));
    }
    Ok((mode, wi_document))
}

#[derive(Debug)]
struct Upload {
    filename: String,
    bytes: Vec<u8>,
}

async fn submit_workflow(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut wi_document: Option<Upload> = None;
    let mut item_master: Option<Upload> = None;
    let mut comparison_mode: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("invalid multipart payload: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "wi_document" | "item_master" => {
                let filename = field
                    .file_name()
                    .map(sanitize_filename)
                    .unwrap_or_else(|| "upload.bin".to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::InvalidInput(format!("failed to read upload: {}", e)))?
                    .to_vec();
                let upload = Upload { filename, bytes };
                if name == "wi_document" {
                    wi_document = Some(upload);
                } else {
                    item_master = Some(upload);
                }
            }
            "comparison_mode" => {
                comparison_mode = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::InvalidInput(format!("invalid field: {}", e)))?,
                );
            }
            _ => {}
        }
    }

    let (mode, wi_document) = validate_submission(
        comparison_mode.as_deref(),
        wi_document,
        item_master.is_some(),
    )?;

    let workflow_id = Uuid::new_v4().to_string();
    let workflow_dir = state.upload_dir.join(&workflow_id);
    std::fs::create_dir_all(&workflow_dir)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to create upload dir: {}", e)))?;

    let wi_path = workflow_dir.join(stored_filename("wi_document", &wi_document.filename));
    std::fs::write(&wi_path, &wi_document.bytes)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to store WI document: {}", e)))?;

    let item_master_path = match &item_master {
        Some(upload) => {
            let path = workflow_dir.join(stored_filename("item_master", &upload.filename));
            std::fs::write(&path, &upload.bytes).map_err(|e| {
                ApiError::Internal(anyhow::anyhow!("failed to store item master: {}", e))
            })?;
            Some(path.to_string_lossy().into_owned())
        }
        None => None,
    };

    let wi_path = wi_path.to_string_lossy().into_owned();
    state
        .db
        .create_workflow(&workflow_id, mode, &wi_path, item_master_path.as_deref())
        .await?;

    state
        .queue
        .submit(WorkflowJob {
            workflow_id: workflow_id.clone(),
            wi_path,
            item_master_path,
            comparison_mode: mode,
        })
        .await
        .map_err(ApiError::Internal)?;

    info!("Accepted workflow {} (mode {})", workflow_id, mode.as_str());
    Ok(Json(json!({
        "success": true,
        "workflow_id": workflow_id,
        "message": "Processing started successfully",
    })))
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    std::path::Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "upload.bin".to_string())
}

/// On-disk name for an upload, prefixed with its form field so the WI
/// document and item master never collide even when the client sends the
/// same filename for both.
fn stored_filename(field: &str, filename: &str) -> String {
    format!("{}_{}", field, filename)
}

async fn list_workflows(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let workflows = state.db.get_all_workflows().await?;
    let workflows: Vec<Value> = workflows
        .into_iter()
        .map(|w| {
            let has_results = state.results_dir.join(format!("{}.json", w.id)).exists();
            let mut value = serde_json::to_value(&w).unwrap_or(Value::Null);
            if let Some(obj) = value.as_object_mut() {
                obj.insert("has_results".to_string(), Value::Bool(has_results));
            }
            value
        })
        .collect();
    Ok(Json(json!({ "success": true, "workflows": workflows })))
}

async fn workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state
        .db
        .get_workflow(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Workflow not found: {}", id)))?;
    Ok(Json(serde_json::to_value(&workflow).unwrap_or(Value::Null)))
}

async fn workflow_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let path = state.results_dir.join(format!("{}.json", id));
    let contents = std::fs::read_to_string(&path)
        .map_err(|_| ApiError::NotFound(format!("Results not found: {}", id)))?;
    let results: Value = serde_json::from_str(&contents)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt results artifact: {}", e)))?;
    Ok(Json(results))
}

#[derive(Deserialize)]
struct KnowledgeBaseQuery {
    #[serde(default)]
    search: String,
    limit: Option<i64>,
}

async fn knowledge_base(
    State(state): State<AppState>,
    Query(params): Query<KnowledgeBaseQuery>,
) -> Result<Json<Value>, ApiError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let items = state
        .db
        .search_knowledge_base(&params.search, limit)
        .await?;
    let stats = state.db.knowledge_base_stats().await?;
    Ok(Json(json!({ "success": true, "items": items, "stats": stats })))
}

async fn pending_approvals(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pending = state.db.get_pending_approvals().await?;
    Ok(Json(json!({ "success": true, "pending_items": pending })))
}

#[derive(Deserialize)]
struct ApprovalRequest {
    workflow_id: String,
    item_ids: Vec<i64>,
}

async fn approve_items(
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<Value>, ApiError> {
    let count = state
        .db
        .approve_items(&request.workflow_id, &request.item_ids)
        .await?;
    Ok(Json(json!({ "success": true, "approved_count": count })))
}

async fn reject_items(
    State(state): State<AppState>,
    Json(request): Json<ApprovalRequest>,
) -> Result<Json<Value>, ApiError> {
    let count = state
        .db
        .reject_items(&request.workflow_id, &request.item_ids)
        .await?;
    Ok(Json(json!({ "success": true, "rejected_count": count })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ExtractionAgent;
    use crate::extractor::DocumentExtractor;
    use crate::gateway::{GatewayClient, GatewayConfig};
    use crate::pipeline::PipelineContext;
    use crate::translation::Translator;

    async fn test_state(dir: &std::path::Path) -> AppState {
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
        let queue = WorkflowQueue::start(
            PipelineContext {
                db: db.clone(),
                extractor: DocumentExtractor::new(agent.clone()),
                translator: Translator::new(gateway),
                agent,
                results_dir: dir.join("results"),
            },
            1,
        );
        AppState {
            db,
            queue,
            upload_dir: dir.join("uploads"),
            results_dir: dir.join("results"),
        }
    }

    #[tokio::test]
    async fn test_results_missing_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path()).await;
        let err = workflow_results(State(state), Path("no-such-id".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_status_unknown_workflow_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_state(dir.path()).await;
        let err = workflow_status(State(state), Path("no-such-id".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    fn upload(filename: &str) -> Upload {
        Upload {
            filename: filename.to_string(),
            bytes: b"content".to_vec(),
        }
    }

    #[test]
    fn test_full_mode_requires_item_master() {
        let err = validate_submission(Some("full"), Some(upload("wi.txt")), false).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_full_mode_with_item_master_accepted() {
        let (mode, document) =
            validate_submission(Some("full"), Some(upload("wi.txt")), true).expect("mode");
        assert_eq!(mode, ComparisonMode::Full);
        assert_eq!(document.filename, "wi.txt");
    }

    #[test]
    fn test_kb_only_mode_without_item_master_accepted() {
        let (mode, _) =
            validate_submission(Some("kb_only"), Some(upload("wi.txt")), false).expect("mode");
        assert_eq!(mode, ComparisonMode::KbOnly);
    }

    #[test]
    fn test_missing_document_rejected() {
        let err = validate_submission(Some("kb_only"), None, false).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(validate_submission(Some("partial"), Some(upload("wi.txt")), true).is_err());
        assert!(validate_submission(None, Some(upload("wi.txt")), true).is_err());
    }

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("wi.txt"), "wi.txt");
        assert_eq!(sanitize_filename(""), "upload.bin");
    }

    #[test]
    fn test_stored_filenames_never_collide_across_fields() {
        let wi = stored_filename("wi_document", "data.csv");
        let master = stored_filename("item_master", "data.csv");
        assert_ne!(wi, master);
        assert_eq!(wi, "wi_document_data.csv");
        assert_eq!(master, "item_master_data.csv");
    }
}
