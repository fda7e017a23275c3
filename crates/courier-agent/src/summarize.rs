use std::sync::Arc;

use courier_core::types::ArgumentMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::provider::{ChatRequest, LlmProvider};

/// Turns raw tool output into prose for the user with one model call.
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: String, max_tokens: u32) -> Self {
        Self {
            provider,
            model,
            max_tokens,
        }
    }

    /// Never fails: a model error yields a fixed message pointing the user at
    /// the raw output.
    pub async fn summarize(&self, tool: &str, arguments: &ArgumentMap, raw_result: &str) -> String {
        let prompt = summary_prompt(tool, arguments, raw_result);
        let req = ChatRequest::prompt(self.model.clone(), prompt, self.max_tokens);

        match self.provider.send(&req).await {
            Ok(resp) => {
                debug!(tool, tokens_out = resp.tokens_out, "tool result summarized");
                resp.content.trim().to_string()
            }
            Err(e) => {
                warn!(tool, provider = self.provider.name(), error = %e, "summarization failed");
                fallback_summary(tool)
            }
        }
    }
}

pub fn fallback_summary(tool: &str) -> String {
    format!(
        "I processed the {tool} request, but had trouble interpreting the results. \
         You can see the raw output above."
    )
}

fn summary_prompt(tool: &str, arguments: &ArgumentMap, raw_result: &str) -> String {
    format!(
        "You are an email assistant. You just executed the function {tool} \
         with arguments {} and got this result:\n\n\
         {raw_result}\n\n\
         Please interpret this result in a user-friendly way. If this contains email data, \
         format it nicely. If this is a confirmation of an action, summarize what happened. \
         If there's an error, explain it clearly and suggest what to do next.",
        Value::Object(arguments.clone())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ProviderError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.seen.lock().unwrap().push(req.messages[0].content.clone());
            Ok(ChatResponse {
                content: "  Your email was sent.\n".into(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".into(),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl LlmProvider for Down {
        fn name(&self) -> &str {
            "down"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn returns_trimmed_model_output() {
        let echo = Arc::new(Echo {
            seen: Mutex::new(Vec::new()),
        });
        let summarizer = Summarizer::new(echo.clone(), "m".into(), 256);
        let mut args = ArgumentMap::new();
        args.insert("to".into(), "a@b.com".into());

        let text = summarizer.summarize("send-email", &args, "Email sent\n").await;
        assert_eq!(text, "Your email was sent.");

        let prompt = &echo.seen.lock().unwrap()[0];
        assert!(prompt.contains("executed the function send-email"));
        assert!(prompt.contains(r#"{"to":"a@b.com"}"#));
        assert!(prompt.contains("Email sent\n"));
    }

    #[tokio::test]
    async fn model_failure_falls_back() {
        let summarizer = Summarizer::new(Arc::new(Down), "m".into(), 256);
        let text = summarizer
            .summarize("read-unread", &ArgumentMap::new(), "raw")
            .await;
        assert_eq!(
            text,
            "I processed the read-unread request, but had trouble interpreting the results. \
             You can see the raw output above."
        );
    }
}
