//! HTTP endpoints for bashbot.
//!
//! A small surface next to the console agent:
//! - `GET  /health`               — liveness
//! - `POST /tools/{tool_name}`    — run one tool through the registry
//! - `POST /agent/execute_task`   — accept a goal (acknowledged, not executed)
//!
//! Built on Axum.

use axum::{
    Router,
    extract::{Path, State},
    response::Json,
    routing::{get, post},
};
use bashbot_config::GatewayConfig;
use bashbot_core::memory::MemoryBackend;
use bashbot_core::message::ToolCall;
use bashbot_core::tool::TOOL_ERROR_PREFIX;
use bashbot_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub tools: Arc<ToolRegistry>,
    /// Injected into tools that need the store; `None` makes them fail cleanly.
    pub memory: Option<Arc<dyn MemoryBackend>>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tools/{tool_name}", post(tool_handler))
        .route("/agent/execute_task", post(execute_task_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server.
pub async fn serve(
    config: &GatewayConfig,
    state: SharedState,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct ToolRequest {
    #[serde(default)]
    tool_args: Value,
}

/// Run a tool and shape its output for HTTP clients.
///
/// JSON object output is returned as-is, other text as `{"result": ..}`,
/// and tool errors as `{"error": ..}` with the marker stripped.
async fn tool_handler(
    State(state): State<SharedState>,
    Path(tool_name): Path<String>,
    Json(payload): Json<ToolRequest>,
) -> Json<Value> {
    if !state.tools.contains(&tool_name) {
        debug!(tool = %tool_name, "Unknown tool requested over HTTP");
        return Json(serde_json::json!({
            "error": format!("Tool '{tool_name}' not found."),
        }));
    }

    let call = ToolCall::new(tool_name.as_str(), payload.tool_args);
    let output = state.tools.dispatch(&call, state.memory.as_deref()).await;
    info!(tool = %tool_name, bytes = output.len(), "Tool executed over HTTP");

    Json(render_tool_output(&output))
}

fn render_tool_output(output: &str) -> Value {
    if let Some(message) = output.strip_prefix(TOOL_ERROR_PREFIX) {
        return serde_json::json!({ "error": message.trim_start() });
    }
    match serde_json::from_str::<Value>(output) {
        Ok(value @ Value::Object(_)) => value,
        _ => serde_json::json!({ "result": output }),
    }
}

#[derive(Deserialize)]
struct TaskRequest {
    goal: String,
}

#[derive(Serialize)]
struct TaskResponse {
    status: &'static str,
    details: &'static str,
}

async fn execute_task_handler(Json(task): Json<TaskRequest>) -> Json<TaskResponse> {
    info!(goal_len = task.goal.len(), "Task received");
    Json(TaskResponse {
        status: "in_progress",
        details: "Agent is processing the task...",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bashbot_core::message::NewMessage;
    use bashbot_memory::{NoopEmbedder, SqliteMemory};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn tools() -> Arc<ToolRegistry> {
        let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../manifests");
        Arc::new(bashbot_tools::default_registry(&dir).unwrap())
    }

    fn test_state() -> SharedState {
        Arc::new(GatewayState {
            tools: tools(),
            memory: None,
        })
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let app = build_router(test_state());

        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn web_search_over_http() {
        let (status, body) = post_json(
            build_router(test_state()),
            "/tools/web_search",
            serde_json::json!({"tool_args": {"query": "rust"}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["title"], "Result for 'rust'");
        assert_eq!(body["results"][0]["url"], "https://example.com/search?q=rust");
    }

    #[tokio::test]
    async fn unknown_tool_over_http() {
        let (status, body) = post_json(
            build_router(test_state()),
            "/tools/teleport",
            serde_json::json!({"tool_args": {}}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"error": "Tool 'teleport' not found."}));
    }

    #[tokio::test]
    async fn missing_argument_is_error_body() {
        let (_, body) = post_json(
            build_router(test_state()),
            "/tools/web_search",
            serde_json::json!({"tool_args": {}}),
        )
        .await;
        assert!(body["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn memory_query_without_store_is_error_body() {
        let (_, body) = post_json(
            build_router(test_state()),
            "/tools/memory_query",
            serde_json::json!({"tool_args": {"query": "cat"}}),
        )
        .await;
        assert!(body["error"].as_str().unwrap().contains("memory store"));
    }

    #[tokio::test]
    async fn memory_query_with_store_returns_text_result() {
        let db = SqliteMemory::new("sqlite::memory:", Arc::new(NoopEmbedder), 768)
            .await
            .unwrap();
        db.append(NewMessage::user(1, "my cat is Biscuit")).await.unwrap();
        let state = Arc::new(GatewayState {
            tools: tools(),
            memory: Some(Arc::new(db)),
        });

        let (_, body) = post_json(
            build_router(state),
            "/tools/memory_query",
            serde_json::json!({"tool_args": {"query": "biscuit"}}),
        )
        .await;
        let text = body["result"].as_str().unwrap();
        assert!(text.starts_with("--- Memory Found ---"));
        assert!(text.contains("my cat is Biscuit"));
    }

    #[tokio::test]
    async fn execute_task_acknowledges() {
        let (status, body) = post_json(
            build_router(test_state()),
            "/agent/execute_task",
            serde_json::json!({"goal": "tidy my notes"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"status": "in_progress", "details": "Agent is processing the task..."})
        );
    }

    #[tokio::test]
    async fn execute_task_requires_goal() {
        let (status, _) = post_json(
            build_router(test_state()),
            "/agent/execute_task",
            serde_json::json!({}),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[test]
    fn plain_text_output_is_wrapped() {
        assert_eq!(render_tool_output("hello"), serde_json::json!({"result": "hello"}));
        assert_eq!(render_tool_output("[1, 2]"), serde_json::json!({"result": "[1, 2]"}));
        assert_eq!(
            render_tool_output("[TOOL_ERROR] boom"),
            serde_json::json!({"error": "boom"})
        );
    }
}
