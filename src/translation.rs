use tracing::warn;

use crate::gateway::GatewayClient;
use crate::prompt;
use crate::TARGET_LLM_REQUEST;

/// Translation adapter over the LLM gateway. Translation is best-effort:
/// any failure hands the original text back unchanged so the pipeline can
/// continue on the untranslated document.
#[derive(Clone, Debug)]
pub struct Translator {
    gateway: GatewayClient,
}

impl Translator {
    pub fn new(gateway: GatewayClient) -> Self {
        Translator { gateway }
    }

    /// Single round trip, no retries. Fail-open on any error.
    pub async fn translate_to_english(&self, text: &str) -> String {
        let prompt = prompt::translate_to_english_prompt(text);
        match self.gateway.chat_once(&prompt, false, None).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Translation failed, passing original text through: {:#}", e);
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayConfig;

    fn unreachable_gateway() -> GatewayClient {
        GatewayClient::new(
            GatewayConfig {
                url: "http://127.0.0.1:9/chat/completions".to_string(),
                model: "test-model".to_string(),
                api_key: "test-key".to_string(),
            },
            1,
        )
    }

    #[tokio::test]
    async fn test_translate_fails_open_with_original_text() {
        let translator = Translator::new(unreachable_gateway());
        let original = "ライン 1\nライン 2\t表";
        let result = translator.translate_to_english(original).await;
        assert_eq!(result, original);
    }

    #[tokio::test]
    async fn test_translate_fails_open_preserves_empty_lines() {
        let translator = Translator::new(unreachable_gateway());
        let original = "step 1\n\nstep 2\n";
        assert_eq!(translator.translate_to_english(original).await, original);
    }
}
