//! Local Ollama provider, useful when no Gemini key is at hand.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        debug!(model = %req.model, "sending request to Ollama");

        let resp = self
            .client
            .post(self.endpoint())
            .json(&build_request_body(req))
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    ProviderError::Unavailable(format!("Ollama not reachable: {e}"))
                } else {
                    ProviderError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Ollama API error");
            return Err(api_error(status, &req.model, &text));
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(parse_response(api_resp))
    }
}

/// Ollama reports failures as `{"error": "..."}`. A 404 means the model has
/// not been pulled, which no retry will fix.
fn api_error(status: u16, model: &str, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ApiError>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());
    if status == 404 {
        return ProviderError::Unavailable(format!(
            "{message} (run `ollama pull {model}` first)"
        ));
    }
    ProviderError::Api { status, message }
}

fn build_request_body(req: &ChatRequest) -> serde_json::Value {
    let mut messages = Vec::with_capacity(req.messages.len() + 1);
    if !req.system.is_empty() {
        messages.push(serde_json::json!({
            "role": "system",
            "content": req.system,
        }));
    }
    for m in &req.messages {
        messages.push(serde_json::json!({
            "role": m.role,
            "content": m.content,
        }));
    }

    serde_json::json!({
        "model": req.model,
        "messages": messages,
        "stream": false,
        "options": {
            "num_predict": req.max_tokens,
        },
    })
}

fn parse_response(resp: ApiResponse) -> ChatResponse {
    ChatResponse {
        content: resp.message.content,
        model: resp.model,
        tokens_in: resp.prompt_eval_count.unwrap_or(0),
        tokens_out: resp.eval_count.unwrap_or(0),
        stop_reason: if resp.done {
            resp.done_reason.unwrap_or_else(|| "stop".to_string())
        } else {
            String::new()
        },
    }
}

// Ollama API response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    model: String,
    message: OllamaMessage,
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
}

#[derive(Deserialize)]
struct ApiError {
    error: String,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}
