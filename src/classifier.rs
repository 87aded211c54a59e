use std::collections::HashSet;

use crate::models::{ExtractedItem, ItemMasterRow, RawItem};

pub const ACTION_AUTO_REGISTER: &str = "Auto-Register";
pub const ACTION_HUMAN_REVIEW: &str = "Human Intervention Required";

/// Builds the part-number and material-name lookup sets from the parsed
/// item master, skipping blank values.
pub fn item_master_index(rows: &[ItemMasterRow]) -> (HashSet<String>, HashSet<String>) {
    let pn_set = rows
        .iter()
        .filter(|r| !r.part_number.is_empty())
        .map(|r| r.part_number.clone())
        .collect();
    let name_set = rows
        .iter()
        .filter(|r| !r.material_name.is_empty())
        .map(|r| r.material_name.clone())
        .collect();
    (pn_set, name_set)
}

/// Applies the deterministic classification rules to one extracted item.
/// First matching rule wins. Lookups are exact, case-sensitive string
/// matches against the item-master sets; no normalization is applied.
pub fn classify(
    raw: RawItem,
    pn_set: &HashSet<String>,
    name_set: &HashSet<String>,
) -> ExtractedItem {
    let pn_match = !raw.part_number.is_empty() && pn_set.contains(&raw.part_number);
    let name_match = !raw.material_name.is_empty() && name_set.contains(&raw.material_name);
    let qty_present = !raw.qty.is_empty();

    let (label, confidence, reasoning, action) = if pn_match && qty_present {
        // Rule 1: part number in the master plus a quantity
        ("1", "high", "Match to BOM & Item Master Data", ACTION_AUTO_REGISTER)
    } else if !pn_match && name_match {
        // Rule 4: no part number match but the name appears in the master
        ("4", "low", "Check for text match in master data", ACTION_HUMAN_REVIEW)
    } else {
        ("5", "low", "No match found", ACTION_HUMAN_REVIEW)
    };

    ExtractedItem {
        material_name: raw.material_name,
        part_number: raw.part_number,
        qty: raw.qty,
        uom: raw.uom,
        vendor_name: raw.vendor_name,
        description: raw.description,
        qa_classification_label: label.to_string(),
        qa_confidence_level: confidence.to_string(),
        reasoning: reasoning.to_string(),
        action_path: action.to_string(),
    }
}
