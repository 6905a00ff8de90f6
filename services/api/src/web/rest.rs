//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use draw_duel_core::{GameError, PublicDrawing, Timeline};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{IntoParams, OpenApi, ToSchema};

use crate::web::middleware::{maybe_user, CurrentUser};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        submit_drawing_handler,
        fetch_drawing_handler,
        list_my_drawings_handler,
        submit_guess_handler,
        list_duels_handler,
        leaderboard_handler,
        prompt_words_handler,
    ),
    components(schemas(
        crate::web::auth::SignupRequest,
        crate::web::auth::LoginRequest,
        crate::web::auth::AuthResponse,
        SubmitDrawingRequest,
        SubmitDrawingResponse,
        DrawingResponse,
        DrawingSummaryResponse,
        GuessRequest,
        GuessResponse,
        OpenDuelResponse,
        LeaderboardEntry,
        WordsResponse,
    )),
    tags(
        (name = "Draw Duel API", description = "Submit drawings as stroke timelines, replay them, and duel over the secret word.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request/Response Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SubmitDrawingRequest {
    /// The recorded stroke events, in replay order.
    #[schema(value_type = Vec<Object>)]
    pub timeline: serde_json::Value,
    /// The secret word the drawing depicts.
    pub word: String,
}

#[derive(Serialize, ToSchema)]
pub struct SubmitDrawingResponse {
    pub id: String,
}

/// A drawing as served to a viewer. The `word` key is present only when the
/// viewer is the author.
#[derive(Serialize, ToSchema)]
pub struct DrawingResponse {
    pub id: String,
    #[schema(value_type = Vec<Object>)]
    pub timeline: Timeline,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

impl From<PublicDrawing> for DrawingResponse {
    fn from(drawing: PublicDrawing) -> Self {
        Self {
            id: drawing.id,
            timeline: drawing.timeline,
            created_at: drawing.created_at,
            word: drawing.word,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct DrawingSummaryResponse {
    pub id: String,
    pub word: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema)]
pub struct GuessRequest {
    pub guess: String,
}

#[derive(Serialize, ToSchema)]
pub struct GuessResponse {
    pub correct: bool,
}

#[derive(Serialize, ToSchema)]
pub struct OpenDuelResponse {
    pub drawing_id: String,
    pub author_nickname: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub nickname: String,
    pub points: i64,
}

#[derive(Deserialize, IntoParams)]
pub struct WordsQuery {
    /// How many prompt words to return (default 3, at most 10).
    pub count: Option<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct WordsResponse {
    pub words: Vec<String>,
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Maps the engine taxonomy onto HTTP statuses. `Forbidden` and `NotFound`
/// stay distinct so clients can tell "does not exist" from "not allowed".
fn game_err(err: GameError) -> (StatusCode, String) {
    match err {
        GameError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        GameError::NotFound => (StatusCode::NOT_FOUND, "drawing not found".to_string()),
        GameError::Forbidden => (
            StatusCode::FORBIDDEN,
            "not allowed to guess this drawing".to_string(),
        ),
        GameError::StoreUnavailable(msg) => {
            error!("Store unavailable: {}", msg);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "store unavailable".to_string(),
            )
        }
        GameError::Internal(msg) => {
            error!("Internal error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a finished drawing with its secret word.
#[utoipa::path(
    post,
    path = "/drawings",
    request_body = SubmitDrawingRequest,
    responses(
        (status = 201, description = "Drawing stored", body = SubmitDrawingResponse),
        (status = 400, description = "Malformed timeline or empty word"),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn submit_drawing_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<SubmitDrawingRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Decode the transport payload into the typed event vocabulary; unknown
    // event types, modes, or styles are rejected here.
    let timeline: Timeline = serde_json::from_value(req.timeline)
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("malformed timeline: {e}")))?;

    let id = state
        .duels
        .submit_drawing(user_id, timeline, &req.word)
        .await
        .map_err(game_err)?;
    Ok((StatusCode::CREATED, Json(SubmitDrawingResponse { id })))
}

/// Fetch a drawing for replay.
///
/// Anyone with the link may view the timeline; the secret word is included
/// only when the caller is the drawing's author.
#[utoipa::path(
    get,
    path = "/drawings/{id}",
    params(("id" = String, Path, description = "The drawing's opaque identifier")),
    responses(
        (status = 200, description = "The drawing, word included for the author only", body = DrawingResponse),
        (status = 404, description = "Unknown drawing"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn fetch_drawing_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // A session lookup failure must not demote the caller to anonymous:
    // the author would get their own drawing back without the word.
    let viewer = maybe_user(&state, &headers)
        .await
        .map_err(|e| game_err(GameError::from(e)))?;
    let drawing = state
        .duels
        .fetch_drawing(&id, viewer)
        .await
        .map_err(game_err)?;
    Ok(Json(DrawingResponse::from(drawing)))
}

/// List the caller's own drawings, newest first.
#[utoipa::path(
    get,
    path = "/drawings/mine",
    responses(
        (status = 200, description = "The caller's drawings", body = [DrawingSummaryResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_my_drawings_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let summaries = state.duels.my_drawings(user_id).await.map_err(game_err)?;
    let response: Vec<DrawingSummaryResponse> = summaries
        .into_iter()
        .map(|s| DrawingSummaryResponse {
            id: s.id,
            word: s.word,
            created_at: s.created_at,
        })
        .collect();
    Ok(Json(response))
}

/// Submit a guess for a drawing's secret word.
#[utoipa::path(
    post,
    path = "/drawings/{id}/guess",
    params(("id" = String, Path, description = "The drawing's opaque identifier")),
    request_body = GuessRequest,
    responses(
        (status = 200, description = "Guess evaluated", body = GuessResponse),
        (status = 401, description = "Not logged in"),
        (status = 403, description = "Own drawing or already solved"),
        (status = 404, description = "Unknown drawing")
    )
)]
pub async fn submit_guess_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<GuessRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = state
        .duels
        .submit_guess(&id, user_id, &req.guess)
        .await
        .map_err(game_err)?;
    Ok(Json(GuessResponse {
        correct: outcome.correct,
    }))
}

/// List drawings the caller may still attempt.
#[utoipa::path(
    get,
    path = "/duels",
    responses(
        (status = 200, description = "Open duels, newest first", body = [OpenDuelResponse]),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn list_duels_handler(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let duels = state.duels.open_duels(user_id).await.map_err(game_err)?;
    let response: Vec<OpenDuelResponse> = duels
        .into_iter()
        .map(|d| OpenDuelResponse {
            drawing_id: d.drawing_id,
            author_nickname: d.author_nickname,
        })
        .collect();
    Ok(Json(response))
}

/// The top players by points.
#[utoipa::path(
    get,
    path = "/leaderboard",
    responses(
        (status = 200, description = "Top players, points descending", body = [LeaderboardEntry])
    )
)]
pub async fn leaderboard_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = state
        .duels
        .leaderboard(state.config.leaderboard_size)
        .await
        .map_err(game_err)?;
    let response: Vec<LeaderboardEntry> = users
        .into_iter()
        .map(|u| LeaderboardEntry {
            nickname: u.nickname,
            points: u.points,
        })
        .collect();
    Ok(Json(response))
}

/// Offer candidate words to draw.
#[utoipa::path(
    get,
    path = "/words",
    params(WordsQuery),
    responses(
        (status = 200, description = "Distinct prompt words", body = WordsResponse),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn prompt_words_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WordsQuery>,
) -> impl IntoResponse {
    let count = query.count.unwrap_or(3).min(10);
    Json(WordsResponse {
        words: state.words.pick_random_words(count),
    })
}
