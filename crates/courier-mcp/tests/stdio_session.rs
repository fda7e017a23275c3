// Drive ToolSession against scripted `sh` processes standing in for an MCP
// tool server. Each script answers the client's requests in order:
// initialize (id 1), the initialized notification, tools/list (id 2), then
// tools/call (id 3).

use courier_core::config::ToolServerConfig;
use courier_core::types::ArgumentMap;
use courier_mcp::{InitStatus, McpError, ToolSession};

const FAKE_MAIL_SERVER: &str = r#"
read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake-mail","version":"0.1"}}}'
read -r line
read -r line
printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/message","params":{"level":"info","data":"listing"}}'
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"send-email","description":"Send an email","inputSchema":{"type":"object","properties":{"to":{"type":"string"},"subject":{"type":"string"},"body":{"type":"string"}},"required":["to"]}}]}}'
read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"Email sent to a@b.com"}],"isError":false}}'
read -r line
"#;

fn script_config(script: &str, timeout_secs: u64) -> ToolServerConfig {
    ToolServerConfig {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        connect_timeout_secs: timeout_secs,
        ..ToolServerConfig::default()
    }
}

#[tokio::test]
async fn connects_lists_and_calls_tools() {
    let session = ToolSession::new();
    let status = session.connect(&script_config(FAKE_MAIL_SERVER, 10)).await;
    assert_eq!(status, InitStatus::Success { tool_count: 1 });

    let connected = session.connected().await.expect("session ready");
    let tool = connected.find_tool("send-email").expect("tool listed");
    let names: Vec<&str> = tool.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["to", "subject", "body"]);
    assert!(tool.parameters[0].required);

    let mut args = ArgumentMap::new();
    args.insert("to".into(), "a@b.com".into());
    let output = connected
        .provider
        .call_tool("send-email", args)
        .await
        .expect("call succeeds");
    assert!(!output.is_error);
    assert_eq!(output.to_text(), "Email sent to a@b.com\n");
}

#[tokio::test]
async fn server_dying_at_startup_reports_classified_cause() {
    let script = r#"echo "FileNotFoundError: Credentials file not found: gmail_cred.json" >&2; exit 1"#;
    let session = ToolSession::new();
    let status = session.connect(&script_config(script, 10)).await;

    match status {
        InitStatus::Failed { error } => {
            assert!(
                error.starts_with("Gmail credentials file not found"),
                "unexpected error: {error}"
            );
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(session.tools().await.is_empty());
}

#[tokio::test]
async fn silent_server_hits_connect_timeout() {
    let session = ToolSession::new();
    let status = session.connect(&script_config("sleep 30", 1)).await;

    match status {
        InitStatus::Failed { error } => assert!(error.contains("timed out after 1s")),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_binary_fails_without_panicking() {
    let session = ToolSession::new();
    let config = ToolServerConfig {
        command: "/definitely/not/a/tool-server".to_string(),
        args: Vec::new(),
        ..ToolServerConfig::default()
    };
    let status = session.connect(&config).await;
    match status {
        InitStatus::Failed { error } => assert!(error.contains("failed to spawn")),
        other => panic!("expected spawn failure, got {other:?}"),
    }
}

#[tokio::test]
async fn server_exiting_mid_call_reports_its_stderr() {
    let script = r#"
read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"flaky-mail","version":"0.1"}}}'
read -r line
read -r line
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"read-unread","inputSchema":{"type":"object","properties":{}}}]}}'
read -r line
echo "gmail token revoked" >&2
exit 3
"#;
    let session = ToolSession::new();
    let status = session.connect(&script_config(script, 10)).await;
    assert_eq!(status, InitStatus::Success { tool_count: 1 });

    let connected = session.connected().await.expect("session ready");
    let err = connected
        .provider
        .call_tool("read-unread", ArgumentMap::new())
        .await
        .expect_err("server exits instead of answering");
    match err {
        McpError::ServerExited(reason) => assert!(reason.contains("gmail token revoked")),
        other => panic!("expected ServerExited, got {other:?}"),
    }
}
