use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    #[error("Invocation not found: {id}")]
    InvocationNotFound { id: String },
}

impl CourierError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            CourierError::Config(_) => "CONFIG_ERROR",
            CourierError::LlmProvider(_) => "LLM_PROVIDER_ERROR",
            CourierError::InvocationNotFound { .. } => "INVOCATION_NOT_FOUND",
        }
    }
}

pub type Result<T> = std::result::Result<T, CourierError>;
