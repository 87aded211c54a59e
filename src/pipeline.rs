use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info};

use crate::agent::ExtractionAgent;
use crate::classifier;
use crate::db::Database;
use crate::extractor::DocumentExtractor;
use crate::models::{
    ComparisonMode, ExtractedItem, KbMatch, Summary, WorkflowJob, WorkflowResults, WorkflowStatus,
};
use crate::translation::Translator;
use crate::TARGET_WORKFLOW;

/// Everything a worker needs to drive one workflow end to end. Cloned into
/// each worker task; all members are cheap handles.
#[derive(Clone)]
pub struct PipelineContext {
    pub db: Database,
    pub extractor: DocumentExtractor,
    pub translator: Translator,
    pub agent: ExtractionAgent,
    pub results_dir: PathBuf,
}

impl PipelineContext {
    pub fn results_path(&self, workflow_id: &str) -> PathBuf {
        self.results_dir.join(format!("{}.json", workflow_id))
    }

    /// Run one workflow to completion. This is the only place pipeline
    /// failures are caught: any stage error transitions the workflow to
    /// `error` and stops. Nothing persisted before the failure is rolled
    /// back, and there is no retry.
    pub async fn run_workflow(&self, job: &WorkflowJob) {
        info!(target: TARGET_WORKFLOW, "Workflow {}: starting pipeline", job.workflow_id);
        if let Err(e) = self.process(job).await {
            error!(target: TARGET_WORKFLOW, "Workflow {} failed: {:#}", job.workflow_id, e);
            let _ = self
                .db
                .update_workflow_status(
                    &job.workflow_id,
                    WorkflowStatus::Error,
                    None,
                    None,
                    &format!("Processing failed: {:#}", e),
                )
                .await;
        }
    }

    async fn process(&self, job: &WorkflowJob) -> Result<()> {
        let id = job.workflow_id.as_str();

        // Stage 1: extract text and reference rows from the uploads.
        self.db
            .update_workflow_status(
                id,
                WorkflowStatus::Processing,
                Some(10),
                Some("extracting"),
                "Extracting data from documents",
            )
            .await?;

        let wi_content = self.extractor.extract_text(&job.wi_path)?;
        let item_master = self
            .extractor
            .parse_item_master(job.item_master_path.as_deref())
            .await?;
        info!(
            target: TARGET_WORKFLOW,
            "Workflow {}: extracted {} chars of document text, {} item master rows",
            id, wi_content.len(), item_master.len()
        );

        // Stage 2: best-effort translation; failure passes the original
        // text through rather than aborting.
        self.db
            .update_workflow_status(
                id,
                WorkflowStatus::Processing,
                Some(30),
                Some("translating"),
                "Translating document to English",
            )
            .await?;

        let translated = self.translator.translate_to_english(&wi_content).await;
        info!(target: TARGET_WORKFLOW, "Workflow {}: translation stage done", id);

        // Stage 3: extract candidate items and classify against the master.
        self.db
            .update_workflow_status(
                id,
                WorkflowStatus::Processing,
                Some(50),
                Some("classifying"),
                "Classifying and matching extracted items",
            )
            .await?;

        // The item master is re-parsed here on purpose: the parse is
        // idempotent and this stage must not depend on stage-1 state.
        let item_master = self
            .extractor
            .parse_item_master(job.item_master_path.as_deref())
            .await?;
        let (pn_set, name_set) = classifier::item_master_index(&item_master);

        let mut raw_items = self.agent.extract_all_items(&translated).await;

        // Fill in quantity/unit gaps with a targeted follow-up per item.
        for raw in raw_items.iter_mut() {
            if !raw.material_name.is_empty() && raw.qty.is_empty() && raw.uom.is_empty() {
                let details = self.agent.extract_details(&translated, &raw.material_name).await;
                raw.qty = details.qty;
                raw.uom = details.uom;
            }
        }

        let mut matches: Vec<ExtractedItem> = raw_items
            .into_iter()
            .map(|raw| classifier::classify(raw, &pn_set, &name_set))
            .collect();

        // Items the master could not resolve get one knowledge-base pass.
        self.match_against_knowledge_base(&mut matches).await?;

        info!(
            target: TARGET_WORKFLOW,
            "Workflow {}: classified {} item(s)", id, matches.len()
        );

        // Stage 4: persist the results artifact and queue approvals.
        let summary = generate_summary(&matches, job.comparison_mode);
        self.save_results(id, &matches, &summary).await?;
        self.create_pending_approvals(id, &matches).await?;

        // Stage 5: terminal success.
        self.db
            .update_workflow_status(
                id,
                WorkflowStatus::Completed,
                Some(100),
                Some("completed"),
                "Processing completed successfully",
            )
            .await?;

        info!(target: TARGET_WORKFLOW, "Workflow {}: completed", id);
        Ok(())
    }

    /// Second-chance matching for unmatched ("5") items against the curated
    /// knowledge base. A confirmed match keeps the item on the human-review
    /// path but raises its confidence and records the knowledge_base source
    /// in the reasoning, which the summary counts.
    async fn match_against_knowledge_base(&self, items: &mut [ExtractedItem]) -> Result<()> {
        for item in items.iter_mut().filter(|i| i.qa_classification_label == "5") {
            let Some(query) = kb_match_query(item).map(str::to_string) else {
                continue;
            };
            let candidates = self
                .db
                .search_knowledge_base(&query, 10)
                .await
                .context("knowledge base search failed")?;
            if let Some(found) = self.agent.find_best_match(item, &candidates).await {
                apply_kb_match(item, &found);
            }
        }
        Ok(())
    }

    /// Writes the `{matches, summary}` artifact to disk and mirrors it into
    /// the database in one statement.
    async fn save_results(
        &self,
        workflow_id: &str,
        matches: &[ExtractedItem],
        summary: &Summary,
    ) -> Result<()> {
        let artifact = WorkflowResults {
            matches: matches.to_vec(),
            summary: summary.clone(),
        };
        let artifact_json =
            serde_json::to_string_pretty(&artifact).context("failed to serialize results")?;

        std::fs::create_dir_all(&self.results_dir)
            .with_context(|| format!("failed to create {}", self.results_dir.display()))?;
        let path = self.results_path(workflow_id);
        std::fs::write(&path, &artifact_json)
            .with_context(|| format!("failed to write {}", path.display()))?;

        // The mirror row stores the same `{"matches": …}` wrapper as the
        // file artifact, so either source deserializes identically.
        let matches_json = serde_json::to_string(&serde_json::json!({ "matches": matches }))
            .context("failed to serialize matches")?;
        let summary_json = serde_json::to_string(summary).context("failed to serialize summary")?;
        self.db
            .save_workflow_results(workflow_id, &matches_json, &summary_json)
            .await
            .context("failed to mirror results into the database")?;
        Ok(())
    }

    /// One pending approval per classified item. Every classified item
    /// carries a low/medium/high confidence, so in practice all of them
    /// queue for review.
    async fn create_pending_approvals(
        &self,
        workflow_id: &str,
        matches: &[ExtractedItem],
    ) -> Result<()> {
        for item in matches {
            if matches!(item.qa_confidence_level.as_str(), "low" | "medium" | "high") {
                let payload =
                    serde_json::to_string(item).context("failed to serialize pending item")?;
                self.db
                    .add_pending_item(workflow_id, &payload)
                    .await
                    .context("failed to queue pending approval")?;
            }
        }
        Ok(())
    }
}

/// Search key for the knowledge-base pass: part number when present,
/// otherwise material name. An item with neither is skipped outright.
fn kb_match_query(item: &ExtractedItem) -> Option<&str> {
    if !item.part_number.is_empty() {
        Some(&item.part_number)
    } else if !item.material_name.is_empty() {
        Some(&item.material_name)
    } else {
        None
    }
}

/// Rewrites an unmatched item's verdict after a confirmed knowledge-base
/// match. The reasoning keeps the "knowledge_base" marker the summary
/// counts on.
fn apply_kb_match(item: &mut ExtractedItem, found: &KbMatch) {
    item.qa_classification_label = "2".to_string();
    item.qa_confidence_level = "medium".to_string();
    item.reasoning = format!(
        "Match found in knowledge_base: '{}' (score {:.2})",
        found.item.material_name, found.confidence_score
    );
}

/// Aggregate counts for the results artifact.
pub fn generate_summary(items: &[ExtractedItem], comparison_mode: ComparisonMode) -> Summary {
    Summary {
        total_materials: items.len(),
        successful_matches: items
            .iter()
            .filter(|i| matches!(i.qa_confidence_level.as_str(), "high" | "medium"))
            .count(),
        knowledge_base_matches: items
            .iter()
            .filter(|i| i.reasoning.to_lowercase().contains("knowledge_base"))
            .count(),
        comparison_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemMasterRow;

    fn item(confidence: &str, reasoning: &str) -> ExtractedItem {
        ExtractedItem {
            material_name: "Grease".to_string(),
            part_number: String::new(),
            qty: String::new(),
            uom: String::new(),
            vendor_name: String::new(),
            description: String::new(),
            qa_classification_label: "5".to_string(),
            qa_confidence_level: confidence.to_string(),
            reasoning: reasoning.to_string(),
            action_path: String::new(),
        }
    }

    fn kb_hit(material_name: &str) -> KbMatch {
        KbMatch {
            item: ItemMasterRow {
                material_name: material_name.to_string(),
                ..Default::default()
            },
            confidence_score: 0.8,
        }
    }

    #[test]
    fn test_kb_match_query_prefers_part_number() {
        let mut unmatched = item("low", "No match found");
        unmatched.part_number = "PN-7".to_string();
        assert_eq!(kb_match_query(&unmatched), Some("PN-7"));

        unmatched.part_number.clear();
        assert_eq!(kb_match_query(&unmatched), Some("Grease"));
    }

    #[test]
    fn test_kb_match_query_skips_nameless_items() {
        let mut unmatched = item("low", "No match found");
        unmatched.material_name.clear();
        assert_eq!(kb_match_query(&unmatched), None);
    }

    #[test]
    fn test_kb_match_raises_unmatched_item_to_medium() {
        let mut unmatched = item("low", "No match found");
        apply_kb_match(&mut unmatched, &kb_hit("Molykote Grease"));
        assert_eq!(unmatched.qa_classification_label, "2");
        assert_eq!(unmatched.qa_confidence_level, "medium");
        assert_eq!(
            unmatched.reasoning,
            "Match found in knowledge_base: 'Molykote Grease' (score 0.80)"
        );
    }

    #[test]
    fn test_summary_counts() {
        let mut kb_matched = item("low", "No match found");
        apply_kb_match(&mut kb_matched, &kb_hit("Grease"));
        let items = vec![
            item("high", "Match to BOM & Item Master Data"),
            kb_matched,
            item("low", "No match found"),
        ];
        let summary = generate_summary(&items, ComparisonMode::Full);
        assert_eq!(summary.total_materials, 3);
        assert_eq!(summary.successful_matches, 2);
        assert_eq!(summary.knowledge_base_matches, 1);
        assert_eq!(summary.comparison_mode, ComparisonMode::Full);
    }

    #[test]
    fn test_summary_empty() {
        let summary = generate_summary(&[], ComparisonMode::KbOnly);
        assert_eq!(summary.total_materials, 0);
        assert_eq!(summary.successful_matches, 0);
        assert_eq!(summary.knowledge_base_matches, 0);
    }
}
