use serde::{Deserialize, Serialize};

/// Lifecycle of a single document-processing workflow. The pipeline is the
/// sole writer once a workflow leaves `Queued`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Queued => "queued",
            WorkflowStatus::Processing => "processing",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Error => "error",
        }
    }

    pub fn parse(s: &str) -> WorkflowStatus {
        match s {
            "queued" => WorkflowStatus::Queued,
            "processing" => WorkflowStatus::Processing,
            "completed" => WorkflowStatus::Completed,
            _ => WorkflowStatus::Error,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    Full,
    KbOnly,
}

impl ComparisonMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonMode::Full => "full",
            ComparisonMode::KbOnly => "kb_only",
        }
    }

    pub fn parse(s: &str) -> Option<ComparisonMode> {
        match s {
            "full" => Some(ComparisonMode::Full),
            "kb_only" => Some(ComparisonMode::KbOnly),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub status: WorkflowStatus,
    pub progress: i64,
    pub stage: String,
    pub message: String,
    pub comparison_mode: ComparisonMode,
    pub wi_path: String,
    pub item_master_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Raw auxiliary-item record as extracted by the LLM agent. Every field
/// defaults to an empty string when the model omits it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub uom: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub description: String,
}

/// A raw item enriched with the classification verdict.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub uom: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub qa_classification_label: String,
    #[serde(default)]
    pub qa_confidence_level: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub action_path: String,
}

/// Normalized row from the item-master reference spreadsheet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMasterRow {
    #[serde(default)]
    pub material_name: String,
    #[serde(default)]
    pub part_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vendor_name: String,
    #[serde(default)]
    pub uom: String,
}

/// Quantity/unit pair for a single named item.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    #[serde(default)]
    pub qty: String,
    #[serde(default)]
    pub uom: String,
}

/// Best knowledge-base match selected by the LLM. The confidence score is
/// fixed by the adapter, not taken from the model output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KbMatch {
    #[serde(flatten)]
    pub item: ItemMasterRow,
    pub confidence_score: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Summary {
    pub total_materials: usize,
    pub successful_matches: usize,
    pub knowledge_base_matches: usize,
    pub comparison_mode: ComparisonMode,
}

/// The persisted results artifact for one workflow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowResults {
    pub matches: Vec<ExtractedItem>,
    pub summary: Summary,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingApproval {
    pub id: i64,
    pub workflow_id: String,
    pub item: serde_json::Value,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeBaseItem {
    pub id: i64,
    pub material_name: String,
    pub part_number: String,
    pub description: String,
    pub vendor_name: String,
    pub uom: String,
    pub source_workflow_id: String,
    pub approved_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeBaseStats {
    pub total_items: i64,
    pub pending_count: i64,
    pub vendor_count: i64,
}

/// One unit of work handed to the worker pool.
#[derive(Clone, Debug)]
pub struct WorkflowJob {
    pub workflow_id: String,
    pub wi_path: String,
    pub item_master_path: Option<String>,
    pub comparison_mode: ComparisonMode,
}
