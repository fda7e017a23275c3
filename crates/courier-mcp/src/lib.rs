//! MCP (Model Context Protocol) client side of Courier.
//!
//! Spawns the tool server as a child process, speaks JSON-RPC 2.0 over its
//! stdin/stdout (one JSON object per line), and exposes the result through
//! the [`provider::ToolProvider`] trait and the [`session::ToolSession`]
//! lifecycle object.

pub mod client;
pub mod error;
pub mod protocol;
pub mod provider;
pub mod session;

pub use client::McpClient;
pub use error::McpError;
pub use provider::{ToolOutput, ToolProvider};
pub use session::{InitStatus, ToolSession};
