use std::sync::Arc;

use courier_core::types::{Directive, ToolDescriptor};
use tracing::{debug, info};

use crate::directive::parse_response;
use crate::prompt::{PromptComposer, Turn};
use crate::provider::{ChatRequest, LlmProvider, ProviderError};
use crate::summarize::Summarizer;

/// What the model decided to do with a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentReply {
    /// Plain answer, nothing to execute.
    Message(String),
    /// The model asked for a tool. `explanation` is the prose before the
    /// directive and may be empty.
    FunctionCall {
        explanation: String,
        directive: Directive,
    },
}

/// Holds the LLM provider and prompt composer.
/// Shared by both front-ends via `Arc`.
pub struct AgentRuntime {
    provider: Arc<dyn LlmProvider>,
    composer: PromptComposer,
    model: String,
    max_tokens: u32,
}

impl AgentRuntime {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        composer: PromptComposer,
        model: String,
        max_tokens: u32,
    ) -> Self {
        Self {
            provider,
            composer,
            model,
            max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// A summarizer sharing this runtime's provider and model.
    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(self.provider.clone(), self.model.clone(), self.max_tokens)
    }

    /// Compose the prompt, ask the model once and parse its reply.
    pub async fn respond(
        &self,
        user_message: &str,
        history: &[Turn],
        tools: &[ToolDescriptor],
    ) -> Result<AgentReply, ProviderError> {
        let prompt = self.composer.compose(tools, user_message, history);
        let req = ChatRequest::prompt(self.model.clone(), prompt, self.max_tokens);
        info!(
            model = %req.model,
            provider = %self.provider.name(),
            history = history.len(),
            "processing chat request"
        );

        let resp = self.provider.send(&req).await?;
        debug!(
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            stop_reason = %resp.stop_reason,
            "model replied"
        );

        let parsed = parse_response(&resp.content);
        Ok(match parsed.directive {
            Some(directive) => {
                info!(tool = %directive.tool_name, args = directive.raw_arguments.len(), "directive found");
                AgentReply::FunctionCall {
                    explanation: parsed.explanation,
                    directive,
                }
            }
            None => AgentReply::Message(parsed.explanation),
        })
    }
}
