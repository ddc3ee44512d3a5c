//! HTTP + WebSocket API for glyph negotiation
//!
//! Endpoints:
//! - GET  /health                - Health check
//! - POST /negotiate             - Negotiate a glyph for one poem character
//! - POST /poem/hints            - Poem with known characters as codes
//! - GET  /dictionary            - Whole registry
//! - GET  /dictionary/search     - Search by character or translation
//! - GET  /dictionary/:character - One record
//! - POST /dictionary            - Append a record
//! - WS   /ws                    - Live concluded negotiations

use axum::{
    extract::{ws::{Message, WebSocket}, Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::core::controller::NegotiationController;
use crate::core::gateway::EmbeddingGateway;
use crate::core::registry::{GlyphRegistry, HintedPoem};
use crate::types::{
    GlyphCode, GlyphRecord, MergeStatus, Negotiation, NegotiationConfig, NegotiationError,
    NegotiationOutcome, ReasonCode, GENERIC_FAILURE_MESSAGE,
};

/// Gateway shared across request handlers
pub type SharedGateway = Arc<dyn EmbeddingGateway + Send + Sync>;

/// Live update message
#[derive(Debug, Clone, Serialize)]
pub struct NegotiationEvent {
    pub character: char,
    pub glyph: GlyphCode,
    pub success: bool,
    pub attempts: usize,
    pub digest: String,
    pub committed: bool,
}

/// App state
pub struct AppState {
    pub registry: RwLock<GlyphRegistry>,
    /// Where commits are persisted; `None` keeps the registry in memory
    pub registry_path: Option<PathBuf>,
    pub gateway: SharedGateway,
    pub config: NegotiationConfig,
    next_seed: AtomicU64,
    events: broadcast::Sender<NegotiationEvent>,
}

impl AppState {
    pub fn new(
        gateway: SharedGateway,
        registry: GlyphRegistry,
        registry_path: Option<PathBuf>,
        config: NegotiationConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(100);
        let seed = config.seed.unwrap_or_else(rand::random);
        Self {
            registry: RwLock::new(registry),
            registry_path,
            gateway,
            config,
            next_seed: AtomicU64::new(seed),
            events,
        }
    }

    /// Seed for the next negotiation; sequential from the configured seed
    fn take_seed(&self) -> u64 {
        self.next_seed.fetch_add(1, Ordering::Relaxed)
    }
}

/// Negotiate request
#[derive(Debug, Deserialize)]
pub struct NegotiateRequest {
    pub poem: String,
    /// Merge a concluded outcome into the registry
    #[serde(default)]
    pub commit: bool,
    #[serde(default)]
    pub translation: Option<String>,
}

/// Negotiate response
#[derive(Debug, Serialize)]
pub struct NegotiateResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<NegotiationOutcome>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guess_poems: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<MergeStatus>,
}

/// Hints request
#[derive(Debug, Deserialize)]
pub struct HintsRequest {
    pub poem: String,
}

/// Search query
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub term: String,
}

/// Add record request
#[derive(Debug, Deserialize)]
pub struct AddRecordRequest {
    pub character: String,
    pub code: GlyphCode,
    #[serde(default)]
    pub translation: String,
}

/// Add record response
#[derive(Debug, Serialize)]
pub struct AddRecordResponse {
    pub character: char,
    pub status: MergeStatus,
    pub record: GlyphRecord,
}

/// Dictionary response
#[derive(Debug, Serialize)]
pub struct DictionaryResponse {
    pub version: u16,
    pub count: usize,
    pub records: BTreeMap<char, GlyphRecord>,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub registry_records: usize,
    pub vocabulary: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: String,
    pub reason: String,
    pub message: String,
}

fn error_response(status: StatusCode, reason: ReasonCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error".to_string(),
            reason: reason.code().to_string(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// Map a negotiation failure to a response; detail stays in the log
fn negotiation_failure(err: &NegotiationError) -> Response {
    match err {
        NegotiationError::InvalidInput(_) => {
            warn!(reason = %err.reason(), error = %err, "negotiation rejected");
            error_response(StatusCode::BAD_REQUEST, err.reason(), err.user_message())
        }
        _ => {
            error!(reason = %err.reason(), error = %err, "negotiation failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err.reason(), err.user_message())
        }
    }
}

/// Write a registry snapshot on the blocking pool.
///
/// Callers hold the write lock across the await so saves land in merge order.
async fn persist(path: Option<&PathBuf>, registry: &GlyphRegistry) -> Result<(), Response> {
    let path = match path {
        Some(path) => path.clone(),
        None => return Ok(()),
    };
    let snapshot = registry.clone();
    let reason = match tokio::task::spawn_blocking(move || snapshot.save(&path)).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(err)) => {
            error!(reason = %err.reason(), error = %err, "registry save failed");
            err.reason()
        }
        Err(join) => {
            error!(error = %join, "registry save task aborted");
            ReasonCode::R501_REGISTRY_STORAGE
        }
    };
    Err(error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        reason,
        GENERIC_FAILURE_MESSAGE,
    ))
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/negotiate", post(negotiate))
        .route("/poem/hints", post(poem_hints))
        .route("/dictionary", get(get_dictionary).post(add_record))
        .route("/dictionary/search", get(search_dictionary))
        .route("/dictionary/:character", get(get_record))
        .route("/ws", get(websocket_handler))
        .with_state(Arc::new(state))
}

/// Health check endpoint
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let registry = state.registry.read().await;
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::VERSION.to_string(),
        registry_records: registry.len(),
        vocabulary: state.gateway.vocabulary().len(),
    })
}

/// Run one negotiation, optionally merging it into the registry
async fn negotiate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NegotiateRequest>,
) -> Response {
    let known = state.registry.read().await.known_mapping();
    let seed = state.take_seed();
    let gateway = Arc::clone(&state.gateway);
    let config = state.config.clone();
    let poem = req.poem;

    let result = tokio::task::spawn_blocking(move || {
        let controller = NegotiationController::new(gateway.as_ref(), &config);
        controller.negotiate(&poem, &known, &mut StdRng::seed_from_u64(seed))
    })
    .await;

    let negotiation = match result {
        Ok(Ok(negotiation)) => negotiation,
        Ok(Err(err)) => return negotiation_failure(&err),
        Err(join) => {
            error!(error = %join, "negotiation task aborted");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ReasonCode::R402_DATA_INTEGRITY,
                GENERIC_FAILURE_MESSAGE,
            );
        }
    };

    let outcome = match negotiation {
        Negotiation::Skipped(reason) => {
            return Json(NegotiateResponse {
                status: "skipped".to_string(),
                message: Some(reason.user_message().to_string()),
                outcome: None,
                guess_poems: Vec::new(),
                merge: None,
            })
            .into_response()
        }
        Negotiation::Concluded(outcome) => outcome,
    };

    let mut merge = None;
    if req.commit {
        let mut registry = state.registry.write().await;
        let status = registry.merge_outcome(&outcome, req.translation.as_deref().unwrap_or(""));
        if let Err(response) = persist(state.registry_path.as_ref(), &registry).await {
            return response;
        }
        merge = Some(status);
    }

    let _ = state.events.send(NegotiationEvent {
        character: outcome.target_character,
        glyph: outcome.glyph,
        success: outcome.success,
        attempts: outcome.attempt_count(),
        digest: outcome.digest.clone(),
        committed: merge.is_some(),
    });

    Json(NegotiateResponse {
        status: "concluded".to_string(),
        message: None,
        guess_poems: outcome.guess_poems(),
        outcome: Some(outcome),
        merge,
    })
    .into_response()
}

/// Poem with known characters rendered as codes
async fn poem_hints(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HintsRequest>,
) -> Json<HintedPoem> {
    let registry = state.registry.read().await;
    Json(registry.render_hints(&req.poem))
}

/// Whole registry
async fn get_dictionary(State(state): State<Arc<AppState>>) -> Json<DictionaryResponse> {
    let registry = state.registry.read().await;
    let records: BTreeMap<char, GlyphRecord> =
        registry.records().map(|(c, r)| (c, r.clone())).collect();
    Json(DictionaryResponse {
        version: crate::REGISTRY_VERSION,
        count: records.len(),
        records,
    })
}

/// Search by character or translation
async fn search_dictionary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    if query.term.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            ReasonCode::R401_INVALID_INPUT,
            "Search term is empty.",
        );
    }
    let registry = state.registry.read().await;
    let results: BTreeMap<char, GlyphRecord> = registry
        .search(&query.term)
        .into_iter()
        .map(|(c, r)| (c, r.clone()))
        .collect();
    Json(results).into_response()
}

/// One record
async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(character): Path<String>,
) -> Result<Json<GlyphRecord>, StatusCode> {
    let mut chars = character.chars();
    let c = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    let registry = state.registry.read().await;
    registry
        .lookup(c)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Append a record; an existing code is never replaced
async fn add_record(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddRecordRequest>,
) -> Response {
    let mut chars = req.character.chars();
    let character = match (chars.next(), chars.next()) {
        (Some(c), None) => c,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                ReasonCode::R401_INVALID_INPUT,
                "Exactly one character is required.",
            )
        }
    };

    let mut registry = state.registry.write().await;
    let status = registry.insert(character, GlyphRecord::new(req.code, req.translation));
    if let Err(response) = persist(state.registry_path.as_ref(), &registry).await {
        return response;
    }
    info!(%character, status = ?status, "dictionary record added");

    let record = match registry.lookup(character) {
        Some(record) => record.clone(),
        None => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                ReasonCode::R501_REGISTRY_STORAGE,
                GENERIC_FAILURE_MESSAGE,
            )
        }
    };
    Json(AddRecordResponse {
        character,
        status,
        record,
    })
    .into_response()
}

/// WebSocket handler for live updates
async fn websocket_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_websocket(socket, rx))
}

/// Forward events until either side goes away
async fn handle_websocket(socket: WebSocket, mut rx: broadcast::Receiver<NegotiationEvent>) {
    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "websocket subscriber lagging");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let json = serde_json::to_string(&event).unwrap_or_default();
                if sink.send(Message::Text(json)).await.is_err() {
                    break;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Run the API server
pub async fn run_server(addr: &str, state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "nvshu API listening");
    println!("𛅰 Nüshu glyph API running on {}", addr);
    println!("  POST /negotiate             - Negotiate a glyph");
    println!("  POST /poem/hints            - Render known glyphs");
    println!("  GET  /dictionary            - Registry");
    println!("  GET  /dictionary/search     - Search registry");
    println!("  GET  /dictionary/:character - One record");
    println!("  POST /dictionary            - Add record");
    println!("  WS   /ws                    - Live negotiations");
    println!("  GET  /health                - Health check");
    axum::serve(listener, router).await?;
    Ok(())
}
