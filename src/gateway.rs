use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::environment::get_env_var_or;
use crate::TARGET_LLM_REQUEST;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection details for the external LLM gateway, read once at startup.
/// A missing credential is fatal; the process must not serve requests
/// without one.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub url: String,
    pub model: String,
    pub api_key: String,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GATEWAY_API_KEY")
            .map_err(|_| anyhow!("GATEWAY_API_KEY environment variable is not set"))?;
        Ok(GatewayConfig {
            url: get_env_var_or(
                "GATEWAY_API_URL",
                "https://api.ai-gateway.example.com/chat/completions",
            ),
            model: get_env_var_or("GATEWAY_MODEL", "gemini-2.5-flash"),
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

/// Thin client over the gateway's OpenAI-style chat/completions endpoint.
#[derive(Clone, Debug)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayConfig,
    max_retries: u32,
    request_timeout: Duration,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig, max_retries: u32) -> Self {
        GatewayClient {
            http: reqwest::Client::new(),
            config,
            max_retries: max_retries.max(1),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Single request/response round trip. Callers that must fail open
    /// (translation) use this directly instead of the retry loop.
    pub async fn chat_once(
        &self,
        prompt: &str,
        json_mode: bool,
        temperature: Option<f32>,
    ) -> Result<String> {
        let mut payload = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temperature) = temperature {
            payload["temperature"] = json!(temperature);
        }
        if json_mode {
            payload["generationConfig"] = json!({ "responseMimeType": "application/json" });
        }

        // One timeout covers the entire round trip, body included; a
        // gateway that sends headers and then stalls must not wedge a
        // worker.
        let round_trip = async {
            let response = self
                .http
                .post(&self.config.url)
                .bearer_auth(&self.config.api_key)
                .json(&payload)
                .send()
                .await
                .context("gateway request failed")?
                .error_for_status()
                .context("gateway returned an error status")?;
            response
                .json::<ChatResponse>()
                .await
                .context("gateway response was not valid JSON")
        };

        let parsed: ChatResponse = timeout(self.request_timeout, round_trip)
            .await
            .map_err(|_| anyhow!("gateway request timed out"))??;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("gateway response missing 'choices'"))?;

        Ok(choice.message.content)
    }

    /// Round trip with bounded retries and exponential backoff. Returns the
    /// raw completion text on first success.
    pub async fn chat(
        &self,
        prompt: &str,
        json_mode: bool,
        temperature: Option<f32>,
    ) -> Result<String> {
        let mut backoff = 2;
        let mut last_err = None;

        for retry_count in 0..self.max_retries {
            debug!(target: TARGET_LLM_REQUEST, "Sending gateway request ({} chars)", prompt.len());
            match self.chat_once(prompt, json_mode, temperature).await {
                Ok(text) => {
                    debug!(target: TARGET_LLM_REQUEST, "Gateway response received ({} chars)", text.len());
                    return Ok(text);
                }
                Err(e) => {
                    warn!(target: TARGET_LLM_REQUEST, "Gateway request failed: {:#}", e);
                    last_err = Some(e);
                    if retry_count < self.max_retries - 1 {
                        info!(target: TARGET_LLM_REQUEST, "Retrying gateway request... ({}/{})", retry_count + 1, self.max_retries);
                        sleep(Duration::from_secs(backoff)).await;
                        backoff *= 2;
                    }
                }
            }
        }

        error!(target: TARGET_LLM_REQUEST, "No gateway response after {} attempts", self.max_retries);
        Err(last_err.unwrap_or_else(|| anyhow!("gateway request failed")))
    }
}

static JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").expect("valid regex"));

/// Strips a ```json code fence from a completion, returning the inner
/// payload. Text without a fence is returned as-is.
pub fn extract_json_from_markdown(text: &str) -> &str {
    match JSON_FENCE.captures(text) {
        Some(captures) => captures.get(1).map_or(text, |m| m.as_str()),
        None => text,
    }
}
