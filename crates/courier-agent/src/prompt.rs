use std::fmt;

use courier_core::types::ToolDescriptor;
use tracing::warn;

use crate::catalog::describe_tools;

/// Who said something in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    /// Progress notes recorded by the front-end ("Executing: send-email").
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => f.write_str("User"),
            Speaker::Assistant => f.write_str("Assistant"),
            Speaker::System => f.write_str("System"),
        }
    }
}

/// One entry of conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub sender: Speaker,
    pub message: String,
}

impl Turn {
    pub fn new(sender: Speaker, message: impl Into<String>) -> Self {
        Self {
            sender,
            message: message.into(),
        }
    }
}

/// Builds the prompt sent to the model for each user message.
///
/// The prompt is the persona, the tool listing, the directive protocol and
/// the email-handling guidelines, followed by optional history and the
/// user's message.
pub struct PromptComposer {
    persona: String,
}

impl Default for PromptComposer {
    fn default() -> Self {
        Self {
            persona: default_persona(),
        }
    }
}

impl PromptComposer {
    /// Load the persona from `persona_path`, falling back to the built-in
    /// role statement when unset or unreadable.
    pub fn load(persona_path: Option<&str>) -> Self {
        let persona = persona_path
            .and_then(|p| {
                std::fs::read_to_string(p)
                    .map_err(|e| warn!(path = p, error = %e, "failed to load persona file"))
                    .ok()
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(default_persona);
        Self { persona }
    }

    /// Persona + tool listing + protocol rules.
    pub fn system_prompt(&self, tools: &[ToolDescriptor]) -> String {
        format!(
            "{}\n\nAvailable email tools:\n{}\n\n{}",
            self.persona,
            describe_tools(tools),
            protocol_rules()
        )
    }

    /// Full prompt for one model call. `history` is empty for stateless
    /// callers; the terminal chat passes the whole prior exchange.
    pub fn compose(&self, tools: &[ToolDescriptor], user_message: &str, history: &[Turn]) -> String {
        let mut prompt = self.system_prompt(tools);
        if !history.is_empty() {
            prompt.push_str("\n\nConversation history:");
            for turn in history {
                prompt.push_str(&format!("\n{}: {}", turn.sender, turn.message));
            }
        }
        prompt.push_str("\n\nUser: ");
        prompt.push_str(user_message);
        prompt
    }
}

fn default_persona() -> String {
    "You are an intelligent email assistant with access to the user's Gmail account.\n\n\
     Your job is to help the user manage their emails through conversation while using \
     available email tools."
        .to_string()
}

fn protocol_rules() -> &'static str {
    "When you need to use a tool, format your response exactly as follows:\n\
     \n\
     1. First explain your reasoning and what you're going to do\n\
     2. Identify your reasoning type (verification, composition, analysis, synthesis, or decision-making)\n\
     3. Then put the function call on a separate line starting with FUNCTION_CALL:\n\
     FUNCTION_CALL: function_name|parameter1_value|parameter2_value|...\n\
     4. Wait for function results before proceeding with your response\n\
     \n\
     For example, when sending an email:\n\
     I'll send an email to your colleague now.\n\
     [REASONING TYPE: Composition - creating an email based on your request]\n\
     FUNCTION_CALL: send-email|example@gmail.com|Meeting Tomorrow|Hi there, I wanted to confirm our meeting tomorrow at 2pm. Best regards\n\
     \n\
     Important guidelines:\n\
     \n\
     1. REASONING PROCESS:\n\
     - Always explain your thought process before taking any action\n\
     - Label your reasoning type in [brackets]:\n\
       * [REASONING TYPE: Verification] - when checking information\n\
       * [REASONING TYPE: Composition] - when creating or drafting content\n\
       * [REASONING TYPE: Analysis] - when examining email content\n\
       * [REASONING TYPE: Synthesis] - when summarizing multiple emails\n\
       * [REASONING TYPE: Decision-making] - when selecting between options\n\
     - Consider what the user is asking for and choose the appropriate tool\n\
     - Verify information before sending emails or trashing content\n\
     \n\
     2. EMAIL HANDLING:\n\
     - ALWAYS get explicit confirmation before sending any email or trashing messages\n\
     - Draft emails when asked but don't send without confirmation\n\
     - When showing email content, format it clearly with sender, subject, and body\n\
     \n\
     3. VERIFICATION STEPS:\n\
     - Check that email addresses are properly formatted before sending\n\
     - For email drafting, ask if the user wants to make any changes before sending\n\
     - After actions are completed, summarize what was done\n\
     \n\
     4. FUNCTION CALL FORMAT:\n\
     - ALWAYS use the exact format: FUNCTION_CALL: function_name|param1_value|param2_value|...\n\
     - Put at most one FUNCTION_CALL line in a response\n\
     - DO NOT include parameter names in the function call, only their values\n\
     - Values are separated by |, so never use | inside a value\n\
     \n\
     5. CONVERSATION STYLE:\n\
     - Be concise but friendly\n\
     - Format email content for readability\n\
     - Ask clarifying questions when needed\n\
     \n\
     Remember: You must get explicit confirmation before sending emails or deleting content."
}
