use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Typed arguments for one tool call, keyed by declared parameter name.
/// Insertion order follows the tool's parameter order.
pub type ArgumentMap = serde_json::Map<String, serde_json::Value>;

/// Declared JSON-Schema type of a tool parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Array,
    /// A type the coercer has no rule for (`boolean`, `object`, ...).
    /// Values are passed through as strings.
    Other(String),
    /// The schema omitted `type`. Treated as a string.
    Unspecified,
}

impl ParamType {
    /// Map a schema `type` field to a `ParamType`.
    pub fn from_schema(kind: Option<&str>) -> Self {
        match kind {
            Some("string") => ParamType::String,
            Some("integer") => ParamType::Integer,
            Some("number") => ParamType::Number,
            Some("array") => ParamType::Array,
            Some(other) => ParamType::Other(other.to_string()),
            None => ParamType::Unspecified,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => f.write_str("string"),
            ParamType::Integer => f.write_str("integer"),
            ParamType::Number => f.write_str("number"),
            ParamType::Array => f.write_str("array"),
            ParamType::Other(kind) => f.write_str(kind),
            ParamType::Unspecified => f.write_str("unknown"),
        }
    }
}

/// One declared parameter of a tool, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ToolParameter {
    pub fn new(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Schema of one action the tool provider can perform.
///
/// Supplied by the provider when the session starts and never changed
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ToolParameter>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ToolParameter) -> Self {
        self.parameters.push(parameter);
        self
    }
}

/// A `name|arg|arg|...` instruction extracted from one model response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    pub tool_name: String,
    pub raw_arguments: Vec<String>,
}

/// Opaque, process-unique identifier of one dispatched directive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvocationId(pub String);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InvocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle of an invocation. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl InvocationStatus {
    /// Position in the lifecycle; terminal states share the last rank.
    pub fn rank(self) -> u8 {
        match self {
            InvocationStatus::Pending => 0,
            InvocationStatus::Processing => 1,
            InvocationStatus::Completed | InvocationStatus::Error => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.rank() == 2
    }

    /// Whether `self -> next` respects the forward-only lifecycle.
    /// Terminal records never change status again.
    pub fn can_advance_to(self, next: InvocationStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvocationStatus::Pending => "pending",
            InvocationStatus::Processing => "processing",
            InvocationStatus::Completed => "completed",
            InvocationStatus::Error => "error",
        }
    }
}

impl fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracked lifecycle record for one dispatched directive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub id: InvocationId,
    pub tool_name: String,
    pub status: InvocationStatus,
    /// Coerced arguments, once the worker has resolved the tool.
    pub arguments: Option<ArgumentMap>,
    pub raw_result: Option<String>,
    pub summarized_result: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invocation {
    pub fn pending(id: InvocationId, tool_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            tool_name: tool_name.into(),
            status: InvocationStatus::Pending,
            arguments: None,
            raw_result: None,
            summarized_result: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
