//! # HTTP command surface
//!
//! Stands in for the chat platform's slash commands and reaction events. Each
//! route maps to one command; `/cycle` and `/status` are operator extras.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use lib_jotw::connections::PostedMessage;
use lib_jotw::core::{Community, CyclePhase, SubmissionError, TransportError, render};

use super::state::AppState;

pub const NO_CHANNEL_MESSAGE: &str = "Please specify the poll channel with `/channel channel: #polls` first";
pub const FULL_MESSAGE: &str = "Maximum number of jokes reached this week";
pub const EMPTY_MESSAGE: &str = "The joke cannot be empty";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/communities/{id}", get(get_community))
        .route("/communities/{id}/channel", put(set_channel))
        .route("/communities/{id}/jokes", post(submit_joke))
        .route("/messages/{id}", get(get_message))
        .route("/messages/{id}/reactions", post(add_reaction))
        .route("/cycle", post(trigger_cycle))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    Submission(SubmissionError),
    Transport(TransportError),
    NotTextChannel(String),
    NotFound(String),
    Internal(String),
}

impl From<SubmissionError> for ApiError {
    fn from(e: SubmissionError) -> Self {
        ApiError::Submission(e)
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::Transport(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Submission(SubmissionError::NoDestinationConfigured(_)) => {
                (StatusCode::BAD_REQUEST, NO_CHANNEL_MESSAGE.to_string())
            }
            ApiError::Submission(SubmissionError::CapacityExceeded { .. }) => {
                (StatusCode::CONFLICT, FULL_MESSAGE.to_string())
            }
            ApiError::Submission(SubmissionError::EmptyEntry) => (StatusCode::BAD_REQUEST, EMPTY_MESSAGE.to_string()),
            ApiError::Transport(e) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::NotTextChannel(channel) => {
                (StatusCode::BAD_REQUEST, format!("**{channel}** is not a text channel"))
            }
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_string()),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Submission(e) => write!(f, "Submission rejected: {}", e),
            ApiError::Transport(e) => write!(f, "Transport error: {}", e),
            ApiError::NotTextChannel(c) => write!(f, "Not a text channel: {}", c),
            ApiError::NotFound(what) => write!(f, "Not found: {}", what),
            ApiError::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!("{}", self);
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChannelRequest {
    pub channel: String,
    /// Channel kind as reported by the platform; only `text` channels can host polls.
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JokeRequest {
    pub author_id: String,
    #[serde(default)]
    pub author_name: Option<String>,
    pub joke: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct JokeAccepted {
    pub index: usize,
    pub confirmation: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub symbol: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CommunityStatus {
    pub id: String,
    pub channel: Option<String>,
    pub pending: usize,
    pub phase: CyclePhase,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ServerStatus {
    pub window_seconds: u64,
    pub capacity: usize,
    pub communities: Vec<CommunityStatus>,
}

/// Registry mutations save the whole store, so they run on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))
}

pub async fn set_channel(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    Json(body): Json<ChannelRequest>,
) -> Result<Json<Community>, ApiError> {
    let channel = body.channel.trim().to_string();
    let is_text = body.kind.as_deref().is_none_or(|kind| kind.eq_ignore_ascii_case("text"));
    if channel.is_empty() || !is_text {
        return Err(ApiError::NotTextChannel(body.channel));
    }
    let gate = state.gate.clone();
    let id = community_id.clone();
    blocking(move || gate.set_destination(&id, channel)).await?;
    let community = state
        .gate
        .registry()
        .get(&community_id)
        .ok_or_else(|| ApiError::NotFound(format!("community {community_id}")))?;
    Ok(Json(community))
}

pub async fn submit_joke(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    Json(body): Json<JokeRequest>,
) -> Result<(StatusCode, Json<JokeAccepted>), ApiError> {
    let author_name = body.author_name.unwrap_or_else(|| body.author_id.clone());
    state.transport.remember_name(body.author_id.as_str(), author_name.as_str());

    let gate = state.gate.clone();
    let id = community_id.clone();
    let index = blocking(move || gate.submit(&id, &body.author_id, &author_name, &body.joke)).await??;

    let confirmation = state
        .gate
        .registry()
        .get(&community_id)
        .and_then(|c| c.entries.get(index).map(render::submitted))
        .unwrap_or_default();
    Ok((StatusCode::CREATED, Json(JokeAccepted { index, confirmation })))
}

pub async fn get_community(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
) -> Result<Json<Community>, ApiError> {
    state
        .gate
        .registry()
        .get(&community_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("community {community_id}")))
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
    Json(body): Json<ReactionRequest>,
) -> Result<StatusCode, ApiError> {
    state.transport.react(&message_id, &body.symbol, &body.user_id)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<String>,
) -> Result<Json<PostedMessage>, ApiError> {
    state
        .transport
        .message(&message_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("message {message_id}")))
}

/// Starts a cycle in the background; the voting window can be long.
pub async fn trigger_cycle(State(state): State<AppState>) -> StatusCode {
    let controller = state.controller.clone();
    tokio::spawn(async move {
        info!("Manual poll cycle triggered");
        let report = controller.run_cycle().await;
        if report.failed() > 0 {
            error!("Manual cycle finished with {} failed round(s)", report.failed());
        }
        info!("Manual cycle announced {} poll(s)", report.announced());
    });
    StatusCode::ACCEPTED
}

pub async fn status(State(state): State<AppState>) -> Json<ServerStatus> {
    let registry = state.gate.registry();
    let communities = registry
        .snapshot()
        .into_values()
        .map(|c| CommunityStatus {
            phase: state.controller.phase(&c.id),
            pending: c.entries.len(),
            channel: c.destination,
            id: c.id,
        })
        .collect();
    Json(ServerStatus {
        window_seconds: state.controller.window().as_secs(),
        capacity: registry.capacity(),
        communities,
    })
}
