//! HTTP entry point: one POST to kick off a research session and stream its
//! events, one POST to resolve whatever checkpoint it is currently paused on.
//!
//! Grounded on `demos/demo7_axum_sse.rs`'s SSE-over-axum shape
//! (`async_stream::stream!` wrapping a broadcast-backed event stream, a
//! background task driving the workflow while the handler streams its
//! progress) adapted from a single demo route to the two routes spec.md §6
//! describes, and from the teacher's raw `Event`/`App` types to
//! `StreamFrame`/`Coordinator`/`SessionManager`.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::routing::post;
use axum::{Json, Router};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use citeweave::cache::{PaperCache, PaperCacheConfig, QueryCache, QueryCacheConfig};
use citeweave::compression::CompressionConfig;
use citeweave::config::Settings;
use citeweave::coordinator::{Coordinator, CoordinatorConfig};
use citeweave::event_bus::EventEmitter;
use citeweave::llm::{CompletionProvider, OpenRouterProvider};
use citeweave::memory::ResearchMemory;
use citeweave::message::Message;
use citeweave::model::{CheckpointAction, CheckpointResolution};
use citeweave::session::SessionManager;
use citeweave::sources::{ArxivClient, CoreApiClient, OpenAlexClient, PubMedClient, SemanticScholarClient, SourceClient};
use citeweave::stages::{Analyzer, Critic, Planner, Searcher, Validator, Writer};
use citeweave::stream::{EventStreamWriter, StreamFrame};

struct AppState {
    coordinator: Arc<Coordinator>,
    sessions: Arc<SessionManager>,
    heartbeat_interval: std::time::Duration,
}

fn build_app_state(settings: Settings) -> AppState {
    let http = reqwest::Client::new();

    let sources: Vec<Arc<dyn SourceClient>> = vec![
        Arc::new(CoreApiClient::new(http.clone(), settings.core_api_key.clone())),
        Arc::new(SemanticScholarClient::new(http.clone(), settings.semantic_scholar_api_key.clone())),
        Arc::new(OpenAlexClient::new(http.clone(), settings.openalex_email.clone())),
        Arc::new(ArxivClient::new(http.clone())),
        Arc::new(PubMedClient::new(http.clone(), settings.pubmed_api_key.clone())),
    ];

    let paper_cache = Arc::new(PaperCache::new(PaperCacheConfig::default()));
    let query_cache = Arc::new(QueryCache::new(QueryCacheConfig::default()));
    let federator = Arc::new(citeweave::federator::Federator::new(
        sources,
        paper_cache,
        query_cache,
        settings.federator.clone(),
    ));

    let provider: Arc<dyn CompletionProvider> =
        Arc::new(OpenRouterProvider::new(http, settings.openrouter_api_key.clone(), settings.openrouter_model.clone()));

    let planner = Planner::new(provider.clone());
    let searcher = Searcher::new(federator, settings.max_search_rounds);
    let analyzer = Analyzer::new(provider.clone());
    let writer = Writer::new(provider.clone(), CompressionConfig::default());
    let critic = Critic::new(provider, settings.quality_gate);
    let validator = Validator::new();

    let sessions = Arc::new(SessionManager::new(settings.session_remove_after, settings.max_live_sessions));

    let coordinator = Arc::new(Coordinator::new(
        planner,
        searcher,
        analyzer,
        writer,
        critic,
        validator,
        CoordinatorConfig {
            max_search_rounds: settings.max_search_rounds,
            max_iterations: settings.max_iterations,
            min_papers_required: settings.min_papers_required,
            enable_multi_source: settings.enable_multi_source,
            enable_citation_validation: settings.enable_citation_validation,
            enable_context_compression: settings.enable_context_compression,
            checkpoint_timeout: settings.checkpoint_timeout,
        },
        sessions.clone(),
    ));

    AppState {
        coordinator,
        sessions,
        heartbeat_interval: settings.heartbeat_interval,
    }
}

#[derive(Debug, Deserialize)]
struct ResearchRequest {
    messages: Vec<Message>,
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResolveCheckpointRequest {
    #[serde(rename = "sessionId")]
    session_id: String,
    #[serde(rename = "checkpointId")]
    checkpoint_id: String,
    action: CheckpointAction,
    data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ResolveCheckpointResponse {
    ok: bool,
}

async fn start_research(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResearchRequest>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let session_id = request.id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let query = request
        .messages
        .iter()
        .rev()
        .find(|m| m.has_role(Message::USER))
        .map(|m| m.content.clone())
        .unwrap_or_default();

    state.sessions.create(session_id.clone(), query.clone());

    let emitter: Arc<dyn EventEmitter> = Arc::new(state.sessions.emitter(&session_id).expect("session was just created"));
    let reader = state.sessions.subscribe(&session_id).expect("session was just created");

    {
        let coordinator_session_id = session_id.clone();
        let sessions = state.sessions.clone();
        let coordinator = state.coordinator.clone();
        let mut memory = ResearchMemory::new(coordinator_session_id.clone(), query);
        tokio::spawn(async move {
            if let Err(err) = coordinator.run(&coordinator_session_id, &mut memory, emitter).await {
                tracing::error!(session_id = %coordinator_session_id, error = %err, "research session ended with an error");
                let _ = sessions.set_error(&coordinator_session_id, err.to_string());
            }
        });
    }

    let heartbeat_interval = state.heartbeat_interval;
    let sse_stream = async_stream::stream! {
        let mut writer = EventStreamWriter::new(reader, heartbeat_interval);
        while let Some(frame) = writer.next_frame().await {
            let terminal = frame.is_terminal();
            let event = SseEvent::default().json_data(&frame).expect("serialise stream frame");
            yield Ok::<SseEvent, Infallible>(event);
            if terminal {
                break;
            }
        }
    };

    Sse::new(sse_stream)
}

async fn resolve_checkpoint(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResolveCheckpointRequest>,
) -> Json<ResolveCheckpointResponse> {
    let ok = state
        .sessions
        .resolve_checkpoint(
            &request.session_id,
            &request.checkpoint_id,
            CheckpointResolution { action: request.action, data: request.data },
        )
        .is_ok();
    Json(ResolveCheckpointResponse { ok })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let settings = Settings::from_env()?;
    let state = Arc::new(build_app_state(settings));

    let router = Router::new()
        .route("/research", post(start_research))
        .route("/checkpoints/resolve", post(resolve_checkpoint))
        .with_state(state);

    let addr: SocketAddr = "0.0.0.0:8080".parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("citeweave listening on http://{addr}");
    axum::serve(listener, router.into_make_service()).await?;

    Ok(())
}
