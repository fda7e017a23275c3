use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use courier_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use courier_core::config::CourierConfig;
use tracing::info;

mod app;
mod http;
mod terminal;

#[derive(Parser)]
#[command(name = "courier", version, about = "LLM email assistant backed by an MCP tool server")]
struct Cli {
    /// Config file (default: $COURIER_CONFIG, then ~/.courier/courier.toml)
    #[arg(long, env = "COURIER_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP gateway (default)
    Serve,
    /// Interactive chat in the terminal
    Chat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // GEMINI_API_KEY and friends may live in a local .env file.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Serve);

    // Chat mode owns stdout, so logs always go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier=info,courier_agent=info,courier_mcp=info,tower_http=debug".into()
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = CourierConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        CourierConfig::default()
    });

    let provider = build_provider(&config);
    let prompt = courier_agent::prompt::PromptComposer::load(config.agent.persona_path.as_deref());
    let agent = courier_agent::runtime::AgentRuntime::new(
        provider,
        prompt,
        config.agent.model.clone(),
        config.agent.max_tokens,
    );

    let state = Arc::new(app::AppState::new(config, agent));

    match command {
        Command::Chat => terminal::run(state).await,
        Command::Serve => serve(state).await,
    }
}

async fn serve(state: Arc<app::AppState>) -> anyhow::Result<()> {
    if state.config.tool_server.auto_connect {
        state.start_session().await;
    }

    let addr: SocketAddr =
        format!("{}:{}", state.config.gateway.bind, state.config.gateway.port).parse()?;
    let router = app::build_router(state);

    info!("Courier gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// Pick the LLM provider from config.
///
/// Priority order:
///   1. providers.gemini
///   2. providers.ollama
///   3. GEMINI_API_KEY env var
///
/// With none of them the gateway still starts; every model call fails with
/// a clear error.
fn build_provider(config: &CourierConfig) -> Arc<dyn LlmProvider> {
    if let Some(ref gemini) = config.providers.gemini {
        info!("LLM provider: Gemini ({})", gemini.base_url);
        return Arc::new(courier_agent::gemini::GeminiProvider::new(
            gemini.api_key.clone(),
            Some(gemini.base_url.clone()),
        ));
    }

    if let Some(ref ollama) = config.providers.ollama {
        info!("LLM provider: Ollama ({})", ollama.base_url);
        return Arc::new(courier_agent::ollama::OllamaProvider::new(Some(
            ollama.base_url.clone(),
        )));
    }

    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
        info!("LLM provider: Gemini (from env)");
        return Arc::new(courier_agent::gemini::GeminiProvider::new(key, None));
    }

    tracing::warn!("No LLM provider configured, every request will return an error");
    Arc::new(NullProvider)
}

/// Placeholder provider when no API key is available.
struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }

    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no LLM provider configured; set providers.gemini.api_key in courier.toml \
             or GEMINI_API_KEY"
                .into(),
        ))
    }
}
