use std::{collections::HashSet, sync::Arc};
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::AppConfig,
    errors::GenError,
    generate::{self, TextRequest},
    learn::{self, Chapter, ChapterContent},
    modifiers::{self, Catalog},
    prompts::GenerationRequest,
    providers::{ImageProvider, TextModel},
    store::{PathStore, StoredPath},
};

/// Controls that trigger a remote call. Each admits one request at a time.
const CONTROL_TEXT: &str = "text";
const CONTROL_IMAGE: &str = "image";
const CONTROL_ENHANCE: &str = "enhance";
const CONTROL_LEARN: &str = "learn";
const CONTROL_CHAPTER: &str = "chapter";

#[derive(Default)]
pub struct InFlight {
    active: Mutex<HashSet<&'static str>>,
}

impl InFlight {
    /// `None` while another request for `control` has not settled.
    pub fn try_begin(self: &Arc<Self>, control: &'static str) -> Option<InFlightGuard> {
        if !self.active.lock().insert(control) {
            return None;
        }
        Some(InFlightGuard { owner: self.clone(), control })
    }

    pub fn is_busy(&self, control: &str) -> bool {
        self.active.lock().contains(control)
    }
}

pub struct InFlightGuard {
    owner: Arc<InFlight>,
    control: &'static str,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.owner.active.lock().remove(self.control);
    }
}

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<AppConfig>,
    images: Arc<dyn ImageProvider>,
    text: Arc<dyn TextModel>,
    store: Arc<dyn PathStore>,
    in_flight: Arc<InFlight>,
}

impl AppState {
    pub fn new(
        cfg: AppConfig,
        images: Arc<dyn ImageProvider>,
        text: Arc<dyn TextModel>,
        store: Arc<dyn PathStore>,
    ) -> Self {
        Self { cfg: Arc::new(cfg), images, text, store, in_flight: Arc::new(InFlight::default()) }
    }

    pub fn in_flight(&self) -> &Arc<InFlight> { &self.in_flight }

    fn begin(&self, control: &'static str) -> Result<InFlightGuard, ApiErr> {
        self.in_flight.try_begin(control).ok_or_else(|| ApiErr::in_flight(control))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/modifiers", get(get_modifiers))
        .route("/api/prompt/random", get(random_prompt))
        .route("/api/prompt/enhance", post(enhance_prompt))
        .route("/api/prompt/enhance/ai", post(ai_enhance_prompt))
        .route("/api/prompt/compose", post(compose_prompt))
        .route("/api/generate/text", post(generate_text))
        .route("/api/generate/image", post(generate_image))
        .route("/api/learn", get(get_path).post(create_path).delete(clear_path))
        .route("/api/learn/chapters/{number}", get(get_chapter))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("promptforge API listening on http://{bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResp {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResp> {
    Json(HealthResp { status: "ok", version: env!("CARGO_PKG_VERSION") })
}

async fn get_modifiers() -> Json<Catalog> {
    Json(modifiers::catalog())
}

#[derive(Serialize, Deserialize)]
struct PromptBody {
    #[serde(default)]
    prompt: String,
}

async fn random_prompt() -> Json<PromptBody> {
    let prompt = modifiers::random_prompt(&mut rand::rng());
    Json(PromptBody { prompt: prompt.to_string() })
}

async fn enhance_prompt(Json(req): Json<PromptBody>) -> Result<Json<PromptBody>, ApiErr> {
    if req.prompt.trim().is_empty() {
        return Err(GenError::EmptyPrompt.into());
    }
    let prompt = modifiers::enhance_prompt(&req.prompt, &mut rand::rng());
    Ok(Json(PromptBody { prompt }))
}

async fn ai_enhance_prompt(
    State(st): State<AppState>,
    Json(req): Json<PromptBody>,
) -> Result<Json<PromptBody>, ApiErr> {
    let _guard = st.begin(CONTROL_ENHANCE)?;
    let prompt = generate::ai_enhance(st.text.as_ref(), &st.cfg.text.models, &req.prompt).await?;
    Ok(Json(PromptBody { prompt }))
}

async fn compose_prompt(Json(req): Json<GenerationRequest>) -> Json<PromptBody> {
    Json(PromptBody { prompt: req.compose() })
}

/// Plain-text in both directions: the chat view renders the body as markdown.
async fn generate_text(State(st): State<AppState>, Json(req): Json<TextRequest>) -> Response {
    let Some(_guard) = st.in_flight.try_begin(CONTROL_TEXT) else {
        return (StatusCode::CONFLICT, "A request is already in progress").into_response();
    };
    match generate::text(st.text.as_ref(), &st.cfg.text.models, &req).await {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(GenError::EmptyPrompt) => (StatusCode::BAD_REQUEST, "Prompt is required").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "text generation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error generating text").into_response()
        }
    }
}

async fn generate_image(
    State(st): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<generate::ImageOutcome>, ApiErr> {
    let _guard = st.begin(CONTROL_IMAGE)?;
    Ok(Json(generate::image(st.images.as_ref(), &req).await?))
}

#[derive(Deserialize)]
struct LearnReq {
    #[serde(default, alias = "prompt")]
    topic: String,
}

async fn create_path(State(st): State<AppState>, Json(req): Json<LearnReq>) -> Result<Json<StoredPath>, ApiErr> {
    let _guard = st.begin(CONTROL_LEARN)?;
    let path = learn::generate_path(st.text.as_ref(), &st.cfg.text.models, &req.topic).await?;
    let stored = StoredPath::new(req.topic.trim(), path);
    st.store.set(stored.clone()).await.map_err(GenError::store)?;
    Ok(Json(stored))
}

async fn get_path(State(st): State<AppState>) -> Result<Json<StoredPath>, ApiErr> {
    let stored = st.store.get().await.map_err(GenError::store)?;
    stored.map(Json).ok_or_else(|| GenError::NoPath.into())
}

async fn clear_path(State(st): State<AppState>) -> Result<StatusCode, ApiErr> {
    st.store.clear().await.map_err(GenError::store)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct ChapterResp {
    number: usize,
    total: usize,
    chapter: Chapter,
    content: ChapterContent,
}

async fn get_chapter(State(st): State<AppState>, Path(number): Path<usize>) -> Result<Json<ChapterResp>, ApiErr> {
    let stored = st.store.get().await.map_err(GenError::store)?.ok_or(GenError::NoPath)?;
    let _guard = st.begin(CONTROL_CHAPTER)?;
    let (chapter, content) =
        learn::generate_chapter(st.text.as_ref(), &st.cfg.text.models, &stored.path, number).await?;
    Ok(Json(ChapterResp { number, total: stored.path.chapters.len(), chapter, content }))
}

#[derive(Debug)]
pub struct ApiErr {
    status: StatusCode,
    code: String,
    message: String,
    suggestion: Option<String>,
}

impl ApiErr {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self { status, code: code.to_string(), message: message.into(), suggestion: None }
    }

    fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn in_flight(control: &str) -> Self {
        Self::new(StatusCode::CONFLICT, "request_in_flight", format!("A {control} request is already in progress"))
            .with_suggestion("Wait for the current request to finish before submitting again.")
    }
}

impl From<GenError> for ApiErr {
    fn from(e: GenError) -> Self {
        match e {
            GenError::EmptyPrompt => Self::new(StatusCode::BAD_REQUEST, "bad_request", "Prompt is required"),
            GenError::Provider(e) => {
                tracing::error!(error = %e, "provider error");
                Self::new(StatusCode::BAD_GATEWAY, "provider_error", "Generation failed")
                    .with_suggestion("Try submitting again.")
            }
            GenError::Schema(msg) => {
                tracing::error!(error = %msg, "schema violation");
                Self::new(StatusCode::BAD_GATEWAY, "schema_error", "The model returned an unexpected response")
                    .with_suggestion("Try submitting again.")
            }
            e @ GenError::ChapterNotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", e.to_string()),
            GenError::NoPath => Self::new(StatusCode::NOT_FOUND, "not_found", "No learning path stored")
                .with_suggestion("Generate a learning path first."),
            GenError::Store(msg) => {
                tracing::error!(error = %msg, "store error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "Internal error")
            }
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            suggestion: Option<String>,
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code,
                suggestion: self.suggestion,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_request_per_control() {
        let in_flight = Arc::new(InFlight::default());
        let guard = in_flight.try_begin(CONTROL_IMAGE).unwrap();
        assert!(in_flight.try_begin(CONTROL_IMAGE).is_none());
        // other controls are independent
        let other = in_flight.try_begin(CONTROL_LEARN).unwrap();
        assert!(in_flight.is_busy(CONTROL_IMAGE));
        drop(guard);
        assert!(!in_flight.is_busy(CONTROL_IMAGE));
        assert!(in_flight.try_begin(CONTROL_IMAGE).is_some());
        drop(other);
        assert!(!in_flight.is_busy(CONTROL_LEARN));
    }

    #[test]
    fn error_mapping() {
        assert_eq!(ApiErr::from(GenError::EmptyPrompt).status, StatusCode::BAD_REQUEST);
        assert_eq!(ApiErr::from(GenError::Schema("x".into())).status, StatusCode::BAD_GATEWAY);
        assert_eq!(ApiErr::from(GenError::NoPath).status, StatusCode::NOT_FOUND);
        let e = ApiErr::from(GenError::ChapterNotFound { number: 7, total: 5 });
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert!(e.message.contains("chapter 7"));
        assert_eq!(ApiErr::in_flight("image").status, StatusCode::CONFLICT);
    }
}
