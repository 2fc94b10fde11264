use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use kb_core::{
    deserialize_optional_nullable_string, AnswerResolver, ChatReply, IntentClassifier,
    JsonlKnowledgeStore, KbError, KnowledgeEntry, KnowledgePatch, NewKnowledge,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

pub type SharedResolver = AnswerResolver<Arc<JsonlKnowledgeStore>, Arc<dyn IntentClassifier>>;

#[derive(Clone)]
pub struct AppState {
    store: Arc<JsonlKnowledgeStore>,
    resolver: Arc<SharedResolver>,
}

impl AppState {
    pub fn new(
        store: Arc<JsonlKnowledgeStore>,
        classifier: Arc<dyn IntentClassifier>,
        threshold: f32,
    ) -> Self {
        let resolver = AnswerResolver::new(store.clone(), classifier).with_threshold(threshold);
        Self {
            store,
            resolver: Arc::new(resolver),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeCreateRequest {
    pub knowledge_intent: String,
    pub knowledge_question: String,
    pub knowledge_answer: String,
    #[serde(default)]
    pub knowledge_is_faq: bool,
    #[serde(default)]
    pub knowledge_faq_category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeUpdateRequest {
    pub knowledge_intent: Option<String>,
    pub knowledge_question: Option<String>,
    pub knowledge_answer: Option<String>,
    pub knowledge_is_faq: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_nullable_string")]
    pub knowledge_faq_category: Option<Option<String>>,
    pub knowledge_is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeResponse {
    pub knowledge_id: u64,
    pub knowledge_intent: String,
    pub knowledge_question: String,
    pub knowledge_answer: String,
    pub knowledge_is_faq: bool,
    pub knowledge_faq_category: Option<String>,
    pub knowledge_is_active: bool,
    pub knowledge_created_at: DateTime<Utc>,
    pub knowledge_updated_at: DateTime<Utc>,
}

impl From<KnowledgeEntry> for KnowledgeResponse {
    fn from(e: KnowledgeEntry) -> Self {
        Self {
            knowledge_id: e.id,
            knowledge_intent: e.intent,
            knowledge_question: e.question,
            knowledge_answer: e.answer,
            knowledge_is_faq: e.is_faq,
            knowledge_faq_category: e.faq_category,
            knowledge_is_active: e.is_active,
            knowledge_created_at: e.created_at,
            knowledge_updated_at: e.updated_at,
        }
    }
}

impl From<KnowledgeCreateRequest> for NewKnowledge {
    fn from(r: KnowledgeCreateRequest) -> Self {
        Self {
            intent: r.knowledge_intent,
            question: r.knowledge_question,
            answer: r.knowledge_answer,
            is_faq: r.knowledge_is_faq,
            faq_category: r.knowledge_faq_category,
        }
    }
}

impl From<KnowledgeUpdateRequest> for KnowledgePatch {
    fn from(r: KnowledgeUpdateRequest) -> Self {
        Self {
            intent: r.knowledge_intent,
            question: r.knowledge_question,
            answer: r.knowledge_answer,
            is_faq: r.knowledge_is_faq,
            faq_category: r.knowledge_faq_category,
            is_active: r.knowledge_is_active,
        }
    }
}

pub struct ApiError(KbError);

impl From<KbError> for ApiError {
    fn from(err: KbError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            KbError::NotFound(_) => StatusCode::NOT_FOUND,
            KbError::DuplicateIntent(_) => StatusCode::CONFLICT,
            KbError::InvalidEntry(_) => StatusCode::BAD_REQUEST,
            err if err.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(error = %self.0, "request rejected");
        }
        let body = serde_json::json!({ "detail": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/api/chat/answer", post(answer))
        .route("/api/knowledge", get(list_knowledge).post(create_knowledge))
        .route(
            "/api/knowledge/{id}",
            patch(update_knowledge).delete(delete_knowledge),
        )
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "knowledge-base answer service is running" }))
}

async fn answer(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let outcome = state.resolver.resolve(&request.text).await?;
    Ok(Json(outcome.to_reply()))
}

async fn list_knowledge(
    State(state): State<AppState>,
) -> Result<Json<Vec<KnowledgeResponse>>, ApiError> {
    let entries = state.store.list_all().await?;
    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

async fn create_knowledge(
    State(state): State<AppState>,
    Json(request): Json<KnowledgeCreateRequest>,
) -> Result<Json<KnowledgeResponse>, ApiError> {
    let entry = state.store.create(request.into()).await?;
    Ok(Json(entry.into()))
}

async fn update_knowledge(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<KnowledgeUpdateRequest>,
) -> Result<Json<KnowledgeResponse>, ApiError> {
    let entry = state.store.update(id, &request.into()).await?;
    Ok(Json(entry.into()))
}

async fn delete_knowledge(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Serving knowledge-base answers on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await?;
    Ok(())
}
