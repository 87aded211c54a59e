/// Prompt asking the model for every auxiliary item mentioned in a
/// work-instruction document, as a bare JSON array.
pub fn extract_all_items_prompt(document_content: &str) -> String {
    format!(
        r#"Analyze the following document content and extract a raw list of all auxiliary items (consumables, jigs, tools) mentioned.
For each item, identify its material_name, part_number, qty, uom, and vendor_name.
If a detail is not explicitly mentioned, return a blank string for that field.
The output must be a single, valid JSON array of objects, with each object containing all of the required keys. Do not include any other text or formatting.

Document Content:
{document_content}"#
    )
}

pub fn extract_details_prompt(document_content: &str, item_name: &str) -> String {
    format!(
        r#"From the following document content, extract the quantity (qty) and unit of measure (uom) for the item named "{item_name}".
If a detail is not found, use a blank string.
The output must be a valid JSON object with the keys "qty" and "uom".

Document Content:
{document_content}"#
    )
}

/// Prompt mapping arbitrary spreadsheet headers onto the fixed item-master
/// schema. Columns with no equivalent are dropped by the model.
pub fn standardize_item_master_prompt(csv_content: &str) -> String {
    format!(
        r#"Given the following CSV content, standardize the column names to match a predefined list.
Map any equivalent columns (e.g., 'Item Code' to 'part_number'). If a column has no equivalent, ignore it.
The output must be a single, valid JSON array of objects, with each object containing the standardized keys.

Standard Columns: ["material_name", "part_number", "description", "vendor_name", "uom"]

CSV Content:
{csv_content}

Standardized JSON Array:"#
    )
}
