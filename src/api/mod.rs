use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assistant::{Assistant, GraphStatus};
use crate::chains::{Intent, ToolUsage};
use crate::config::InsightConfig;
use crate::error::{InsightError, InsightResult};
use crate::session::Turn;

const FALLBACK_RESPONSE: &str = "I'm having trouble processing your request right now.";

#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub api_keys: BTreeMap<String, bool>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub message: Option<String>,
    /// `message` (default), `history` or `clear`
    pub operation: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub success: bool,
    pub messages: Vec<Turn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub tools_used: Vec<ToolUsage>,
}

impl ConversationResponse {
    fn ok(messages: Vec<Turn>) -> Self {
        Self {
            success: true,
            messages,
            response: None,
            error: None,
            intent: None,
            tools_used: Vec::new(),
        }
    }

    fn failure(error: impl Into<String>, messages: Vec<Turn>) -> Self {
        Self {
            success: false,
            messages,
            response: None,
            error: Some(error.into()),
            intent: None,
            tools_used: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,
    pub api_keys: BTreeMap<String, bool>,
    pub graph: String,
    /// Users with a stored conversation
    pub active_users: usize,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, PartialEq, Eq)]
enum Operation {
    Message,
    History,
    Clear,
}

impl std::str::FromStr for Operation {
    type Err = InsightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "message" => Ok(Operation::Message),
            "history" => Ok(Operation::History),
            "clear" => Ok(Operation::Clear),
            _ => Err(InsightError::invalid_input(format!("Unknown operation: {}", s))),
        }
    }
}

type ApiResult = (StatusCode, Json<ConversationResponse>);

pub struct ApiServer {
    state: AppState,
}

impl ApiServer {
    pub fn new(assistant: Arc<Assistant>, api_keys: BTreeMap<String, bool>) -> Self {
        Self {
            state: AppState { assistant, api_keys },
        }
    }

    pub async fn start(&self, host: &str, port: u16) -> InsightResult<()> {
        let app = self.create_router();
        let addr = format!("{}:{}", host, port);

        info!("Starting Insight API server on {}", addr);

        let listener = TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            // GET routes answer HEAD as well
            .route("/api/health", get(health_handler))
            .route("/api/conversation/:user_id", post(conversation_handler))
            .route("/api/conversation/:user_id/history", get(history_handler))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Welcome to the Insight blockchain assistant API",
        "health": "/api/health",
        "conversation": "/api/conversation/{user_id}",
    }))
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let graph = state.assistant.status().await;

    let degraded = state.api_keys.values().any(|present| !present) || graph != GraphStatus::Available;

    Json(HealthResponse {
        status: if degraded { "degraded" } else { "healthy" }.to_string(),
        api_keys: state.api_keys.clone(),
        graph: graph.to_string(),
        active_users: state.assistant.sessions().user_count().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

async fn conversation_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    body: Option<Json<ConversationRequest>>,
) -> ApiResult {
    let request = body.map(|Json(request)| request).unwrap_or_default();

    let operation = match request.operation.as_deref().unwrap_or("message").parse::<Operation>() {
        Ok(operation) => operation,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ConversationResponse::failure(e.to_string(), Vec::new())),
            );
        }
    };

    match operation {
        Operation::Clear => {
            state.assistant.sessions().clear(&user_id).await;
            info!("Cleared conversation for {}", user_id);
            let mut response = ConversationResponse::ok(Vec::new());
            response.response = Some("Conversation history cleared".to_string());
            (StatusCode::OK, Json(response))
        }
        Operation::History => {
            let messages = state.assistant.sessions().history(&user_id).await;
            (StatusCode::OK, Json(ConversationResponse::ok(messages)))
        }
        Operation::Message => {
            let message = request.message.unwrap_or_default();
            if message.trim().is_empty() {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ConversationResponse::failure("Message is required", Vec::new())),
                );
            }

            match state.assistant.respond(&user_id, &message).await {
                Ok(reply) => (
                    StatusCode::OK,
                    Json(ConversationResponse {
                        success: true,
                        messages: reply.messages,
                        response: Some(reply.response),
                        error: None,
                        intent: Some(reply.intent),
                        tools_used: reply.tools_used,
                    }),
                ),
                Err(e) => {
                    error!("Error processing message for {}: {}", user_id, e);
                    let mut response = ConversationResponse::failure(
                        format!("Error processing message: {}", e),
                        vec![Turn::user(message)],
                    );
                    response.response = Some(FALLBACK_RESPONSE.to_string());
                    (StatusCode::OK, Json(response))
                }
            }
        }
    }
}

async fn history_handler(State(state): State<AppState>, Path(user_id): Path<String>) -> Json<ConversationResponse> {
    let messages = state.assistant.sessions().history(&user_id).await;
    Json(ConversationResponse::ok(messages))
}

/// Build the assistant from configuration and serve the REST API.
pub async fn start_api_server(config: &InsightConfig, host: &str, port: u16) -> InsightResult<()> {
    let assistant = Arc::new(Assistant::from_config(config).await);

    if let GraphStatus::Unavailable(reason) = assistant.status().await {
        error!("Warning: assistant unavailable ({}), conversations will fail", reason);
    }

    let api_server = ApiServer::new(assistant, config.api_key_status());
    api_server.start(host, port).await
}
