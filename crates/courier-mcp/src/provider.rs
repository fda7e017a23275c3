use async_trait::async_trait;
use courier_core::types::{ArgumentMap, ParamType, ToolDescriptor, ToolParameter};
use serde_json::Value;

use crate::client::McpClient;
use crate::error::Result;
use crate::protocol::{ContentItem, ToolInfo};

/// Output of one remote tool call.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: Vec<ContentItem>,
    /// Set by the server when the tool itself reported a failure. The text
    /// still describes what happened, so it is summarized like any result.
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::Text { text: text.into() }],
            is_error: false,
        }
    }

    /// Flatten the content items into the raw result text, one item per line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for item in &self.content {
            match item {
                ContentItem::Text { text } => out.push_str(text),
                other => out.push_str(&serde_json::to_string(other).unwrap_or_default()),
            }
            out.push('\n');
        }
        out
    }
}

/// The external process that actually performs side-effecting actions.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Tools offered by the provider, parameters in declaration order.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke `name` with already-coerced arguments.
    async fn call_tool(&self, name: &str, arguments: ArgumentMap) -> Result<ToolOutput>;
}

#[async_trait]
impl ToolProvider for McpClient {
    fn name(&self) -> &str {
        "mcp-stdio"
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let tools = McpClient::list_tools(self).await?;
        Ok(tools.iter().map(descriptor_from_info).collect())
    }

    async fn call_tool(&self, name: &str, arguments: ArgumentMap) -> Result<ToolOutput> {
        let result = McpClient::call_tool(self, name, Value::Object(arguments)).await?;
        Ok(ToolOutput {
            content: result.content,
            is_error: result.is_error,
        })
    }
}

/// Convert an MCP tool listing into a [`ToolDescriptor`].
///
/// Parameters come from `inputSchema.properties` in the order the server sent
/// them; directive arguments are matched against that order.
pub fn descriptor_from_info(info: &ToolInfo) -> ToolDescriptor {
    let required: Vec<&str> = info
        .input_schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let parameters = info
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, spec)| ToolParameter {
                    name: name.clone(),
                    kind: ParamType::from_schema(spec.get("type").and_then(Value::as_str)),
                    description: spec
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    required: required.contains(&name.as_str()),
                })
                .collect()
        })
        .unwrap_or_default();

    ToolDescriptor {
        name: info.name.clone(),
        description: info.description.clone(),
        parameters,
    }
}
