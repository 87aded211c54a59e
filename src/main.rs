use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use quartermaster::agent::ExtractionAgent;
use quartermaster::db::Database;
use quartermaster::environment::{get_env_var_or, get_env_var_parsed};
use quartermaster::extractor::DocumentExtractor;
use quartermaster::gateway::{GatewayClient, GatewayConfig};
use quartermaster::logging::configure_logging;
use quartermaster::pipeline::PipelineContext;
use quartermaster::translation::Translator;
use quartermaster::web::{self, AppState};
use quartermaster::workers::WorkflowQueue;

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    // A missing gateway credential is fatal; the process must not serve
    // requests it cannot process.
    let gateway_config = GatewayConfig::from_env()?;

    let database_path = get_env_var_or("DATABASE_PATH", "quartermaster.db");
    let upload_dir = PathBuf::from(get_env_var_or("UPLOAD_DIR", "uploads"));
    let results_dir = PathBuf::from(get_env_var_or("RESULTS_DIR", "results"));
    let worker_count: usize = get_env_var_parsed("WORKFLOW_WORKERS", 4);
    let gateway_retries: u32 = get_env_var_parsed("GATEWAY_MAX_RETRIES", 3);
    let port: u16 = get_env_var_parsed("PORT", 8000);

    std::fs::create_dir_all(&upload_dir)?;
    std::fs::create_dir_all(&results_dir)?;

    let db = Database::new(&database_path).await?;

    info!(
        "Using LLM gateway at {} (model {})",
        gateway_config.url, gateway_config.model
    );
    let gateway = GatewayClient::new(gateway_config, gateway_retries);
    let agent = ExtractionAgent::new(gateway.clone());

    let ctx = PipelineContext {
        db: db.clone(),
        extractor: DocumentExtractor::new(agent.clone()),
        translator: Translator::new(gateway),
        agent,
        results_dir: results_dir.clone(),
    };

    let queue = WorkflowQueue::start(ctx, worker_count);
    info!("Started {} workflow worker(s)", worker_count);

    web::serve(
        AppState {
            db,
            queue,
            upload_dir,
            results_dir,
        },
        port,
    )
    .await
}
