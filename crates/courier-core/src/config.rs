use std::collections::HashMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
/// Deadline for one remote tool call and for tool-server setup.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Top-level config (courier.toml + COURIER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub tool_server: ToolServerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Optional file whose contents replace the built-in role statement.
    pub persona_path: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: default_max_tokens(),
            persona_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
}

/// How to launch the MCP tool server (stdio transport).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerConfig {
    #[serde(default = "default_tool_command")]
    pub command: String,
    #[serde(default = "default_tool_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    pub cwd: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Connect as soon as the gateway starts instead of on the first
    /// `POST /api/initialize`.
    #[serde(default)]
    pub auto_connect: bool,
}

impl Default for ToolServerConfig {
    fn default() -> Self {
        Self {
            command: default_tool_command(),
            args: default_tool_args(),
            env: HashMap::new(),
            cwd: None,
            connect_timeout_secs: DEFAULT_TIMEOUT_SECS,
            auto_connect: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Funnel every remote call through one gate. The MCP session is a single
    /// stdio pipe and makes no promise about concurrent calls.
    #[serde(default = "bool_true")]
    pub serialize_calls: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            serialize_calls: true,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_tool_command() -> String {
    "python".to_string()
}
fn default_tool_args() -> Vec<String> {
    vec!["src/gmail/server.py".to_string()]
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_workers() -> usize {
    DEFAULT_WORKERS
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl CourierConfig {
    /// Load config from a TOML file with COURIER_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `COURIER_DISPATCH__CALL_TIMEOUT_SECS=10`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("COURIER_").split("__"))
            .extract()
            .map_err(|e| crate::error::CourierError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.courier/courier.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = CourierConfig::load(Some("does-not-exist.toml")).expect("load");
            assert_eq!(config.gateway.port, DEFAULT_PORT);
            assert_eq!(config.agent.model, DEFAULT_MODEL);
            assert_eq!(config.dispatch.call_timeout_secs, 30);
            assert!(config.dispatch.serialize_calls);
            assert!(config.providers.gemini.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_and_env_are_merged() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [agent]
                model = "gemini-1.5-pro"

                [providers.gemini]
                api_key = "from-file"

                [tool_server]
                command = "uv"
                args = ["run", "server.py"]
                "#,
            )?;
            jail.set_env("COURIER_DISPATCH__WORKERS", "2");
            jail.set_env("COURIER_GATEWAY__PORT", "8080");

            let config = CourierConfig::load(Some("courier.toml")).expect("load");
            assert_eq!(config.agent.model, "gemini-1.5-pro");
            assert_eq!(config.gateway.port, 8080);
            assert_eq!(config.dispatch.workers, 2);
            assert_eq!(config.tool_server.command, "uv");
            assert_eq!(config.tool_server.args, vec!["run", "server.py"]);

            let gemini = config.providers.gemini.expect("gemini section");
            assert_eq!(gemini.api_key, "from-file");
            assert!(gemini.base_url.starts_with("https://generativelanguage"));
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("courier.toml", "[gateway]\nport = \"not a number\"")?;
            let err = CourierConfig::load(Some("courier.toml")).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }
}
