//! Renders the tool catalog as the plain-text listing embedded in the prompt.

use courier_core::types::{ToolDescriptor, ToolParameter};
use tracing::warn;

/// Listing used when the session has no tools.
pub const NO_TOOLS: &str = "No tools available. Server connection might be down.";

const NO_DESCRIPTION: &str = "No description available";

/// One paragraph per tool, separated by blank lines.
///
/// ```text
/// send-email: Send an email
///   Parameters:
///     - to (string): Recipient address
/// ```
///
/// A tool that cannot be rendered is replaced by `Error processing tool {index}`
/// and the rest of the catalog is still listed.
pub fn describe_tools(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return NO_TOOLS.to_string();
    }

    tools
        .iter()
        .enumerate()
        .map(|(index, tool)| {
            describe_tool(tool).unwrap_or_else(|reason| {
                warn!(index, reason, "tool descriptor could not be rendered");
                format!("Error processing tool {index}")
            })
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn describe_tool(tool: &ToolDescriptor) -> Result<String, &'static str> {
    if tool.name.trim().is_empty() {
        return Err("tool has no name");
    }

    let description = tool
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(NO_DESCRIPTION);

    let parameters = if tool.parameters.is_empty() {
        "no parameters".to_string()
    } else {
        let mut lines = String::new();
        for parameter in &tool.parameters {
            lines.push_str("\n    - ");
            lines.push_str(&describe_parameter(parameter)?);
        }
        lines
    };

    Ok(format!("{}: {description}\n  Parameters: {parameters}", tool.name))
}

fn describe_parameter(parameter: &ToolParameter) -> Result<String, &'static str> {
    if parameter.name.trim().is_empty() {
        return Err("parameter has no name");
    }
    Ok(format!(
        "{} ({}): {}",
        parameter.name, parameter.kind, parameter.description
    ))
}
