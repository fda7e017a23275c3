use axum::{
    routing::{get, post},
    Router,
};
use courier_agent::dispatch::Dispatcher;
use courier_agent::runtime::AgentRuntime;
use courier_core::config::CourierConfig;
use courier_mcp::{InitStatus, ToolSession};
use std::sync::Arc;
use tracing::info;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: CourierConfig,
    pub agent: AgentRuntime,
    pub session: Arc<ToolSession>,
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Wire the dispatcher to the session and the agent's summarizer.
    /// Must be called inside a tokio runtime.
    pub fn new(config: CourierConfig, agent: AgentRuntime) -> Self {
        let session = Arc::new(ToolSession::new());
        let dispatcher = Dispatcher::start(
            session.clone(),
            Arc::new(agent.summarizer()),
            &config.dispatch,
        );
        Self {
            config,
            agent,
            session,
            dispatcher,
        }
    }

    /// Start connecting to the tool server in the background if nobody has
    /// yet. Returns `true` when this call started it.
    pub async fn start_session(self: &Arc<Self>) -> bool {
        if !self.session.begin().await {
            return false;
        }
        let state = Arc::clone(self);
        tokio::spawn(async move {
            info!(command = %state.config.tool_server.command, "connecting to tool server");
            if let InitStatus::Success { tool_count } =
                state.session.connect(&state.config.tool_server).await
            {
                info!(tool_count, "tool server connected");
            }
        });
        true
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/initialize",
            post(crate::http::initialize::initialize_handler),
        )
        .route("/api/process", post(crate::http::process::process_handler))
        .route(
            "/api/function_result/{id}",
            get(crate::http::result::function_result_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use courier_agent::prompt::PromptComposer;
    use courier_agent::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
    use courier_core::types::{ArgumentMap, ParamType, ToolDescriptor, ToolParameter};
    use courier_mcp::error::Result as McpResult;
    use courier_mcp::{ToolOutput, ToolProvider};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    /// Model that answers every prompt with the same text. Summaries come
    /// back as that text too.
    pub(crate) struct Canned(pub &'static str);

    #[async_trait]
    impl LlmProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }
        async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Ok(ChatResponse {
                content: self.0.to_string(),
                model: req.model.clone(),
                tokens_in: 0,
                tokens_out: 0,
                stop_reason: "stop".into(),
            })
        }
    }

    pub(crate) struct Offline;

    #[async_trait]
    impl LlmProvider for Offline {
        fn name(&self) -> &str {
            "offline"
        }
        async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
            Err(ProviderError::Unavailable("connection refused".into()))
        }
    }

    pub(crate) struct Mailbox;

    #[async_trait]
    impl ToolProvider for Mailbox {
        fn name(&self) -> &str {
            "mailbox"
        }
        async fn list_tools(&self) -> McpResult<Vec<ToolDescriptor>> {
            Ok(vec![ToolDescriptor::new("read-unread", "Read unread emails")
                .with_parameter(ToolParameter::new("max_results", ParamType::Integer))])
        }
        async fn call_tool(&self, _name: &str, _arguments: ArgumentMap) -> McpResult<ToolOutput> {
            Ok(ToolOutput::text("From: alice@example.com\nSubject: Lunch"))
        }
    }

    pub(crate) fn state_with(provider: Arc<dyn LlmProvider>) -> Arc<AppState> {
        let agent = AgentRuntime::new(provider, PromptComposer::default(), "test".into(), 256);
        Arc::new(AppState::new(CourierConfig::default(), agent))
    }

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_session_status() {
        let state = state_with(Arc::new(Canned("hi")));
        let (status, body) = call(build_router(state), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["session"]["status"], "not_started");
        assert_eq!(body["tools"], 0);
    }

    #[tokio::test]
    async fn initialize_reports_progress_then_success() {
        let state = state_with(Arc::new(Canned("hi")));
        state.session.begin().await;

        let (_, body) = call(build_router(state.clone()), post_json("/api/initialize", json!({}))).await;
        assert_eq!(
            body,
            json!({"success": true, "message": "Initialization in progress", "toolCount": 0})
        );

        state.session.attach(Arc::new(Mailbox)).await;
        let (_, body) = call(build_router(state), post_json("/api/initialize", json!({}))).await;
        assert_eq!(
            body,
            json!({"success": true, "message": "Already initialized", "toolCount": 1})
        );
    }

    #[tokio::test]
    async fn first_initialize_starts_the_session() {
        let mut config = CourierConfig::default();
        config.tool_server.command = "/definitely/not/a/tool-server".into();
        let agent = AgentRuntime::new(
            Arc::new(Canned("hi")),
            PromptComposer::default(),
            "test".into(),
            256,
        );
        let state = Arc::new(AppState::new(config, agent));

        let (_, body) = call(build_router(state.clone()), post_json("/api/initialize", json!({}))).await;
        assert_eq!(
            body,
            json!({"success": true, "message": "Initialization started", "toolCount": 0})
        );

        // The spawn fails, so the next call reports the cause.
        let mut body = Value::Null;
        for _ in 0..100 {
            let (_, b) = call(build_router(state.clone()), post_json("/api/initialize", json!({}))).await;
            body = b;
            if body["success"] == false {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn plain_reply_is_returned_as_message() {
        let state = state_with(Arc::new(Canned("  You have no new mail.  ")));
        let (status, body) = call(
            build_router(state),
            post_json("/api/process", json!({"message": "anything new?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"type": "message", "content": "You have no new mail."}));
    }

    #[tokio::test]
    async fn directive_runs_and_result_can_be_polled() {
        let state = state_with(Arc::new(Canned(
            "Let me check.\nFUNCTION_CALL: read-unread|2",
        )));
        state.session.attach(Arc::new(Mailbox)).await;
        let router = build_router(state.clone());

        let (_, body) = call(
            router.clone(),
            post_json("/api/process", json!({"message": "read my mail"})),
        )
        .await;
        assert_eq!(body["type"], "function_call");
        assert_eq!(body["explanation"], "Let me check.");
        assert_eq!(body["functionName"], "read-unread");
        let id = body["executionId"].as_str().unwrap().to_string();

        let mut result = Value::Null;
        for _ in 0..100 {
            let (status, b) = call(router.clone(), get(&format!("/api/function_result/{id}"))).await;
            assert_eq!(status, StatusCode::OK);
            result = b;
            if result["status"] == "completed" || result["status"] == "error" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(result["status"], "completed");
        assert_eq!(result["functionName"], "read-unread");
        assert_eq!(result["rawResult"], "From: alice@example.com\nSubject: Lunch\n");
        assert_eq!(
            result["processedResult"],
            "Let me check.\nFUNCTION_CALL: read-unread|2"
        );
    }

    #[tokio::test]
    async fn unknown_tool_still_returns_explanation() {
        let state = state_with(Arc::new(Canned("Sure.\nFUNCTION_CALL: launch-rockets|now")));
        state.session.attach(Arc::new(Mailbox)).await;
        let router = build_router(state.clone());

        let (_, body) = call(
            router.clone(),
            post_json("/api/process", json!({"message": "go"})),
        )
        .await;
        assert_eq!(body["type"], "function_call");
        assert_eq!(body["explanation"], "Sure.");
        let id = body["executionId"].as_str().unwrap().to_string();

        let record = state
            .dispatcher
            .wait(&id.as_str().into(), Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(record.error_message.as_deref(), Some("Unknown tool: launch-rockets"));

        let (_, result) = call(router, get(&format!("/api/function_result/{id}"))).await;
        assert_eq!(
            result,
            json!({"status": "error", "functionName": "launch-rockets", "error": "Unknown tool: launch-rockets"})
        );
    }

    #[tokio::test]
    async fn model_failure_is_an_error_reply() {
        let state = state_with(Arc::new(Offline));
        let (status, body) = call(
            build_router(state),
            post_json("/api/process", json!({"message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "error");
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_message_still_reaches_the_model() {
        let state = state_with(Arc::new(Canned("How can I help with your email?")));
        let (status, body) = call(build_router(state), post_json("/api/process", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"type": "message", "content": "How can I help with your email?"})
        );
    }

    #[tokio::test]
    async fn unknown_execution_id_is_404() {
        let state = state_with(Arc::new(Canned("hi")));
        let (status, body) = call(
            build_router(state),
            get("/api/function_result/does-not-exist"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["code"], "INVOCATION_NOT_FOUND");
    }
}
