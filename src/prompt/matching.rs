/// Prompt for a strict true/false containment check of one item within a
/// block of document text.
pub fn check_for_match_prompt(
    text_to_search: &str,
    item_name: &str,
    part_number: Option<&str>,
) -> String {
    format!(
        r#"Does the following document text contain a reference to the item name "{item_name}"?
The part number "{part_number}" might also be used.
Respond with only 'True' or 'False'. Do not include any other text.

Document text:
{text_to_search}"#,
        part_number = part_number.unwrap_or("N/A"),
    )
}

/// Prompt ranking knowledge-base candidates against a newly extracted item.
/// The tie-break policy travels inside the prompt: fuzzy part-number match
/// first, then semantic name/description match, with vendor name as
/// secondary confirmation. Ambiguity must yield an empty object.
pub fn find_best_match_prompt(
    part_number: &str,
    material_name: &str,
    description: &str,
    vendor_name: &str,
    kb_candidates_json: &str,
) -> String {
    let or_na = |s: &str| {
        if s.is_empty() {
            "N/A".to_string()
        } else {
            s.to_string()
        }
    };
    format!(
        r#"You are a highly accurate inventory matching agent. Your task is to find the single best match from a list of candidate items for a new item.

The new item to match is:
- Part Number: {part_number}
- Material Name: {material_name}
- Description: {description}
- Vendor Name: {vendor_name}

The list of candidate items from the knowledge base is:
{kb_candidates_json}

Rules for matching:
1. Prioritize an exact or very close fuzzy match on 'part_number'.
2. If part numbers are not a strong match, use 'material_name' and 'description' to find a strong semantic match.
3. 'vendor_name' is an important secondary piece of information for confirmation.
4. If a strong match is found, return the full details of the best matching item from the list.
5. If no confident match (e.g., more than one ambiguous match or no match at all) is found, return an empty JSON object.
6. The response must be a single, valid JSON object and nothing else. Do not include any explanation or additional text.

Best matching item (or an empty object if no confident match):"#,
        part_number = or_na(part_number),
        material_name = or_na(material_name),
        description = or_na(description),
        vendor_name = or_na(vendor_name),
    )
}
