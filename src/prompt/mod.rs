// Declare submodules
mod extraction;
mod matching;
mod translation;

// Re-export all public prompt builders
pub use extraction::{
    extract_all_items_prompt, extract_details_prompt, standardize_item_master_prompt,
};
pub use matching::{check_for_match_prompt, find_best_match_prompt};
pub use translation::translate_to_english_prompt;
