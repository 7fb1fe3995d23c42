use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::spawn;
use tracing::{error, info};

use crate::{
    app_state::{AppState, Status},
    cache::{CacheStats, CachedRanking},
    corpus::CorpusSummary,
    ingest,
    keywords::Enricher,
    models::{CandidateRecord, DocumentNode, ExtractedQueryEntities},
    scoring::PerformanceMode,
};

/// Número de resultados cuando la petición no lo indica.
const DEFAULT_LIMIT: usize = 5;

type ApiError = (StatusCode, Json<serde_json::Value>);

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SelectDirPayload {
    path: String,
}

#[derive(Deserialize)]
pub struct QueryPayload {
    query: String,
}

#[derive(Deserialize)]
pub struct RankPayload {
    query: String,
    candidates: Vec<CandidateRecord>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    bypass_cache: bool,
}

#[derive(Serialize)]
pub struct ArticleView {
    node: DocumentNode,
    full_content: String,
    ancestors: Vec<DocumentNode>,
    children: Vec<DocumentNode>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/select-directory", post(select_directory_handler))
        .route("/api/ingest", post(ingest_handler))
        .route("/api/status", get(status_handler))
        .route("/api/corpus", get(corpus_handler))
        .route("/api/articles/:document_type/:number", get(article_handler))
        .route("/api/entities", post(entities_handler))
        .route("/api/rank", post(rank_handler))
        .route("/api/cache-stats", get(cache_stats_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

// --- Handlers ---

#[axum::debug_handler]
async fn select_directory_handler(
    State(state): State<AppState>,
    Json(payload): Json<SelectDirPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let path = PathBuf::from(&payload.path);
    if !path.is_dir() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "La ruta proporcionada no es un directorio válido.",
        ));
    }

    *state.current_dir.lock().unwrap_or_else(|p| p.into_inner()) = Some(path);
    Ok((StatusCode::OK, Json(json!({ "message": "Directorio fijado para la ingesta." }))))
}

#[axum::debug_handler]
async fn ingest_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let root_dir = state
        .current_dir
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .clone()
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Primero debe seleccionar un directorio."))?;

    {
        let mut status = state.status();
        if status.is_busy {
            return Err(api_error(StatusCode::CONFLICT, "Ya hay una indexación en curso."));
        }
        status.is_busy = true;
        status.message = "Iniciando indexación...".to_string();
        status.progress = 0.0;
    }

    spawn(async move {
        let result = ingest::ingest_directory(
            &root_dir,
            &state.config.parser,
            Enricher::default(),
            state.status.clone(),
        )
        .await;

        let message = match result {
            Ok((corpus, summary)) => {
                state.replace_corpus(corpus);
                format!("¡Indexación completada! {}", summary)
            }
            Err(err) => {
                error!("Error de ingesta: {}", err);
                format!("Error en la indexación: {}", err)
            }
        };

        let mut status = state.status();
        status.is_busy = false;
        status.progress = 0.0;
        status.message = message;
    });

    Ok(StatusCode::ACCEPTED)
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status().clone())
}

#[axum::debug_handler]
async fn corpus_handler(State(state): State<AppState>) -> Json<CorpusSummary> {
    Json(state.corpus().summary())
}

#[axum::debug_handler]
async fn article_handler(
    State(state): State<AppState>,
    Path((document_type, number)): Path<(String, u32)>,
) -> Result<Json<ArticleView>, ApiError> {
    let corpus = state.corpus();
    let document_type = document_type.to_uppercase();
    let not_found = || {
        api_error(
            StatusCode::NOT_FOUND,
            format!("No existe el Art. {number} en {document_type}"),
        )
    };

    let document = corpus.document(&document_type).ok_or_else(not_found)?;
    let node = document.article(number).ok_or_else(not_found)?;

    Ok(Json(ArticleView {
        full_content: document.full_content(node.id),
        ancestors: document.ancestors(node.id).into_iter().cloned().collect(),
        children: document.children(node.id).into_iter().cloned().collect(),
        node: node.clone(),
    }))
}

#[axum::debug_handler]
async fn entities_handler(
    State(state): State<AppState>,
    Json(payload): Json<QueryPayload>,
) -> Json<ExtractedQueryEntities> {
    Json(state.extractor.extract(&payload.query))
}

#[axum::debug_handler]
async fn rank_handler(
    State(state): State<AppState>,
    Json(payload): Json<RankPayload>,
) -> Result<Json<CachedRanking>, ApiError> {
    let mode: PerformanceMode = match payload.mode.as_deref() {
        Some(mode) => mode
            .parse()
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?,
        None => PerformanceMode::default(),
    };
    let limit = payload.limit.unwrap_or(DEFAULT_LIMIT);
    let document_ids = state.corpus().document_ids();
    let ranker = Arc::clone(&state.ranker);

    // El ranking es CPU y puede esperar al cálculo de otra petición idéntica.
    let ranked = tokio::task::spawn_blocking(move || {
        ranker.rank(
            &payload.query,
            &document_ids,
            &payload.candidates,
            mode,
            limit,
            payload.bypass_cache,
        )
    })
    .await
    .map_err(|e| {
        error!("Tarea de ranking abortada: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?
    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    Ok(Json(ranked))
}

#[axum::debug_handler]
async fn cache_stats_handler(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.ranker.stats())
}

// --- Handler de Apagado ---

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}
