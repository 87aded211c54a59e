pub mod agent;
pub mod classifier;
pub mod db;
pub mod environment;
pub mod error;
pub mod extractor;
pub mod gateway;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod translation;
pub mod web;
pub mod workers;

pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_WORKFLOW: &str = "workflow";
