use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, warn};

use gradmate_core::StudyPlanError;
use gradmate_core::assist::AssistService;
use gradmate_core::plan::{StudyPlanTaskManager, TaskPatch, TaskView};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "authentication required".to_string(),
        }
    }
}

impl From<StudyPlanError> for AppError {
    fn from(err: StudyPlanError) -> Self {
        let status = match &err {
            StudyPlanError::NotFound(_) => StatusCode::NOT_FOUND,
            StudyPlanError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            StudyPlanError::InvalidIdentifier(_) | StudyPlanError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            StudyPlanError::AiResponseInvalid(_) => StatusCode::BAD_GATEWAY,
            StudyPlanError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StudyPlanError::Conflict { .. } => StatusCode::CONFLICT,
        };
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State and identity
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<StudyPlanTaskManager>,
    pub assist: Arc<AssistService>,
    /// Header set by the upstream auth layer.
    pub user_header: HeaderName,
}

impl AppState {
    pub fn new(
        manager: Arc<StudyPlanTaskManager>,
        assist: Arc<AssistService>,
        user_header: &str,
    ) -> Result<Self> {
        let user_header = HeaderName::try_from(user_header)
            .with_context(|| format!("invalid user header name: {user_header:?}"))?;
        Ok(Self {
            manager,
            assist,
            user_header,
        })
    }
}

fn header_user(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// The authenticated caller. Rejects with 401 when the header is missing.
pub struct CurrentUser(pub String);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        header_user(&parts.headers, &state.user_header)
            .map(CurrentUser)
            .ok_or_else(AppError::unauthenticated)
    }
}

/// `Json` whose rejections use the `{"error": ...}` body.
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, AppError> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub plan_title: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub request: String,
    #[serde(default)]
    pub num_tasks: Option<usize>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct TextRequest {
    #[serde(default)]
    pub text: String,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route("/api/tasks/{id}", put(update_task).delete(delete_task))
        .route("/api/studyplan/generate", post(generate_tasks))
        .route("/api/studyplans", get(list_plans))
        .route("/askai", post(ask_ai))
        .route("/summarize", post(summarize))
        .route("/quiz", post(quiz))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(state: AppState, bind: &str, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("gradmate serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("gradmate serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for Ctrl+C");
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Degrades to an empty list when the store is unavailable.
async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<Vec<TaskView>> {
    match state.manager.list_tasks(&user).await {
        Ok(tasks) => Json(tasks),
        Err(e) => {
            warn!(user_id = %user, error = %e, "listing tasks failed; returning empty list");
            Json(Vec::new())
        }
    }
}

async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<CreateTaskRequest>,
) -> Result<axum::response::Response, AppError> {
    let task = state
        .manager
        .create_task(
            &user,
            body.plan_title.as_deref(),
            &body.title,
            body.due_date.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)).into_response())
}

async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<axum::response::Response, AppError> {
    state.manager.update_task(&user, &id, &patch).await?;
    Ok(Json(json!({ "message": "Task updated" })).into_response())
}

async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<axum::response::Response, AppError> {
    state.manager.delete_task(&user, &id).await?;
    Ok(Json(json!({ "message": "Task deleted" })).into_response())
}

async fn generate_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(body): ApiJson<GenerateRequest>,
) -> Result<axum::response::Response, AppError> {
    let outcome = state
        .manager
        .generate_tasks_from_request(&user, &body.request, body.num_tasks, body.title.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "plan_id": outcome.plan_id,
        "tasks_added": outcome.tasks_added,
    }))
    .into_response())
}

async fn list_plans(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<axum::response::Response, AppError> {
    let plans = state.manager.list_plans(&user).await?;
    Ok(Json(plans).into_response())
}

async fn ask_ai(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<PromptRequest>,
) -> Json<serde_json::Value> {
    let user = header_user(&headers, &state.user_header);
    let response = state.assist.ask_chatbot(user.as_deref(), &body.prompt).await;
    Json(json!({ "response": response }))
}

async fn summarize(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<TextRequest>,
) -> Json<serde_json::Value> {
    let user = header_user(&headers, &state.user_header);
    let summary = state.assist.summarize_notes(user.as_deref(), &body.text).await;
    Json(json!({ "summary": summary }))
}

async fn quiz(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(body): ApiJson<TextRequest>,
) -> Json<serde_json::Value> {
    let user = header_user(&headers, &state.user_header);
    let quiz = state.assist.generate_quiz(user.as_deref(), &body.text).await;
    Json(json!({ "quiz": quiz }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
