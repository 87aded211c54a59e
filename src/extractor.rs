use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::agent::ExtractionAgent;
use crate::models::ItemMasterRow;
use crate::TARGET_WORKFLOW;

const STANDARD_COLUMNS: [&str; 5] = [
    "material_name",
    "part_number",
    "description",
    "vendor_name",
    "uom",
];

/// Turns uploaded files into plain text and normalized item-master rows.
/// When the reference spreadsheet already uses the standard column names the
/// rows are mapped locally; otherwise header standardization is delegated to
/// the LLM agent.
#[derive(Clone, Debug)]
pub struct DocumentExtractor {
    agent: ExtractionAgent,
}

impl DocumentExtractor {
    pub fn new(agent: ExtractionAgent) -> Self {
        DocumentExtractor { agent }
    }

    /// Reads the work-instruction document as plain text. Non-UTF-8 bytes
    /// are replaced rather than rejected; scanned exports are messy.
    pub fn extract_text(&self, path: &str) -> Result<String> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read document '{}'", path))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Parses the item-master reference file into normalized rows. Returns
    /// an empty list when no reference document was uploaded.
    pub async fn parse_item_master(&self, path: Option<&str>) -> Result<Vec<ItemMasterRow>> {
        let Some(path) = path else {
            return Ok(Vec::new());
        };
        let csv_text = self.extract_text(path)?;

        if let Some(rows) = parse_standard_csv(&csv_text) {
            debug!(target: TARGET_WORKFLOW, "Item master '{}' uses standard headers; parsed {} rows locally", path, rows.len());
            return Ok(rows);
        }

        info!(target: TARGET_WORKFLOW, "Item master '{}' has nonstandard headers; standardizing via gateway", Path::new(path).display());
        Ok(self.agent.standardize_item_master(&csv_text).await)
    }
}

/// Attempts a local parse of CSV text whose headers already match the
/// standard schema. Returns `None` when any standard column is missing, in
/// which case the caller falls back to LLM standardization.
fn parse_standard_csv(csv_text: &str) -> Option<Vec<ItemMasterRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .ok()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    if !STANDARD_COLUMNS
        .iter()
        .all(|col| headers.iter().any(|h| h == col))
    {
        return None;
    }

    let index_of = |col: &str| headers.iter().position(|h| h == col);
    let material_idx = index_of("material_name")?;
    let part_idx = index_of("part_number")?;
    let description_idx = index_of("description")?;
    let vendor_idx = index_of("vendor_name")?;
    let uom_idx = index_of("uom")?;

    let field = |record: &csv::StringRecord, idx: usize| {
        record.get(idx).unwrap_or("").trim().to_string()
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.ok()?;
        rows.push(ItemMasterRow {
            material_name: field(&record, material_idx),
            part_number: field(&record, part_idx),
            description: field(&record, description_idx),
            vendor_name: field(&record, vendor_idx),
            uom: field(&record, uom_idx),
        });
    }
    Some(rows)
}
