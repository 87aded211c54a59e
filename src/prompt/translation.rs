/// Prompt for Japanese-to-English translation. Formatting must survive the
/// round trip verbatim, so the prompt calls out line breaks and tables.
pub fn translate_to_english_prompt(text: &str) -> String {
    format!(
        r#"Translate the following text from Japanese to English. Maintain all original formatting, including line breaks and tables.

Japanese Text:
{text}

English Translation:"#
    )
}
