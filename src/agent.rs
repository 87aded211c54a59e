use serde_json::Value;
use tracing::warn;

use crate::gateway::{extract_json_from_markdown, GatewayClient};
use crate::models::{ExtractedItem, ItemDetails, ItemMasterRow, KbMatch, KnowledgeBaseItem, RawItem};
use crate::prompt;
use crate::TARGET_LLM_REQUEST;

/// Fixed score attached to any LLM-selected knowledge-base match. The
/// model's own confidence claims are not trusted.
const MATCH_CONFIDENCE_SCORE: f64 = 0.8;

/// All LLM interaction for extraction and matching lives behind this
/// adapter. Every operation swallows gateway and parse failures, returning
/// an empty default instead, so one flaky call never dooms a pipeline run.
#[derive(Clone, Debug)]
pub struct ExtractionAgent {
    gateway: GatewayClient,
}

impl ExtractionAgent {
    pub fn new(gateway: GatewayClient) -> Self {
        ExtractionAgent { gateway }
    }

    /// Extracts the raw list of candidate auxiliary items from a document.
    pub async fn extract_all_items(&self, document_content: &str) -> Vec<RawItem> {
        let prompt = prompt::extract_all_items_prompt(document_content);
        match self.gateway.chat(&prompt, true, Some(0.2)).await {
            Ok(text) => parse_item_array(&text),
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Item extraction failed, returning empty list: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Extracts quantity and unit of measure for one named item.
    pub async fn extract_details(&self, document_content: &str, item_name: &str) -> ItemDetails {
        let prompt = prompt::extract_details_prompt(document_content, item_name);
        match self.gateway.chat(&prompt, true, Some(0.1)).await {
            Ok(text) => parse_detail_object(&text),
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Detail extraction for '{}' failed: {:#}", item_name, e);
                ItemDetails::default()
            }
        }
    }

    /// Asks whether a block of text references the given item. Anything but
    /// a clean affirmative reads as no match.
    pub async fn check_for_match(
        &self,
        text_to_search: &str,
        item_name: &str,
        part_number: Option<&str>,
    ) -> bool {
        let prompt = prompt::check_for_match_prompt(text_to_search, item_name, part_number);
        match self.gateway.chat(&prompt, false, Some(0.2)).await {
            Ok(text) => parse_bool_response(&text),
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Match check for '{}' failed: {:#}", item_name, e);
                false
            }
        }
    }

    /// Maps arbitrary item-master headers onto the fixed schema; unmapped
    /// columns are dropped by the model.
    pub async fn standardize_item_master(&self, csv_content: &str) -> Vec<ItemMasterRow> {
        let prompt = prompt::standardize_item_master_prompt(csv_content);
        match self.gateway.chat(&prompt, true, Some(0.1)).await {
            Ok(text) => parse_row_array(&text),
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Item master standardization failed: {:#}", e);
                Vec::new()
            }
        }
    }

    /// Delegates knowledge-base ranking to the model. Ambiguous or absent
    /// matches come back as `None`; any returned match carries the fixed
    /// confidence score.
    pub async fn find_best_match(
        &self,
        candidate: &ExtractedItem,
        kb_candidates: &[KnowledgeBaseItem],
    ) -> Option<KbMatch> {
        if kb_candidates.is_empty() {
            return None;
        }
        let candidates_json =
            serde_json::to_string_pretty(kb_candidates).unwrap_or_else(|_| "[]".to_string());
        let prompt = prompt::find_best_match_prompt(
            &candidate.part_number,
            &candidate.material_name,
            &candidate.description,
            &candidate.vendor_name,
            &candidates_json,
        );
        match self.gateway.chat(&prompt, true, Some(0.1)).await {
            Ok(text) => parse_match_object(&text).map(|item| KbMatch {
                item,
                confidence_score: MATCH_CONFIDENCE_SCORE,
            }),
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Knowledge base match failed: {:#}", e);
                None
            }
        }
    }
}

/// Parses a completion expected to hold a JSON array of raw items.
/// Malformed or non-array payloads yield an empty list.
pub fn parse_item_array(text: &str) -> Vec<RawItem> {
    let stripped = extract_json_from_markdown(text);
    serde_json::from_str::<Vec<RawItem>>(stripped).unwrap_or_default()
}

/// Parses a completion expected to hold `{"qty": ..., "uom": ...}`,
/// defaulting both fields to blank on failure.
pub fn parse_detail_object(text: &str) -> ItemDetails {
    let stripped = extract_json_from_markdown(text);
    serde_json::from_str::<ItemDetails>(stripped).unwrap_or_default()
}

/// Strict equality against a normalized "true" response.
pub fn parse_bool_response(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

pub fn parse_row_array(text: &str) -> Vec<ItemMasterRow> {
    let stripped = extract_json_from_markdown(text);
    serde_json::from_str::<Vec<ItemMasterRow>>(stripped).unwrap_or_default()
}

/// Parses a best-match completion. The model signals "no confident match"
/// with an empty object; that and any malformed payload become `None`.
pub fn parse_match_object(text: &str) -> Option<ItemMasterRow> {
    let stripped = extract_json_from_markdown(text);
    let value: Value = serde_json::from_str(stripped).ok()?;
    match &value {
        Value::Object(map) if !map.is_empty() => serde_json::from_value(value).ok(),
        _ => None,
    }
}
