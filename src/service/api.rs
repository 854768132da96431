//! REST surface
//!
//! Room discovery and creation, leaderboards, match history and question
//! pre-fetching. Everything that happens inside a room goes over `/ws`.

use crate::error::ArenaError;
use crate::questions::{Question, QuestionRequest};
use crate::rating::{tier_for, MatchPage, PlayerProfile};
use crate::room::{CreateRoomRequest, CreatedRoom};
use crate::service::app::ArenaState;
use crate::types::{Difficulty, RoomFilter, RoomView, Tier, MAX_QUESTION_COUNT};
use crate::validation;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;
const MAX_LEADERBOARD_LIMIT: usize = 100;
const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 50;
const DEFAULT_QUESTION_COUNT: usize = 10;

/// Error returned by REST handlers
#[derive(Debug)]
pub enum ApiError {
    Arena(ArenaError),
    Internal(anyhow::Error),
}

impl From<ArenaError> for ApiError {
    fn from(error: ArenaError) -> Self {
        ApiError::Arena(error)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        ApiError::Internal(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Arena(error) => {
                let status = match &error {
                    ArenaError::RoomNotFound => StatusCode::NOT_FOUND,
                    ArenaError::Internal { .. } | ArenaError::Configuration { .. } => {
                        error!("Request failed: {}", error);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, error.client_message())
            }
            ApiError::Internal(error) => {
                error!("Request failed: {:#}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListRoomsQuery {
    pub mode: Option<String>,
    /// `public=true` hides private rooms
    pub public: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

/// Body of `POST /api/questions`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionsBody {
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<Question>,
}

/// One leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub rating: i32,
    pub tier: Tier,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl LeaderboardEntry {
    fn from_profile(rank: usize, profile: PlayerProfile) -> Self {
        Self {
            rank,
            tier: tier_for(profile.rating),
            user_id: profile.user_id,
            username: profile.username,
            rating: profile.rating,
            wins: profile.wins,
            losses: profile.losses,
            draws: profile.draws,
        }
    }
}

pub fn router(state: ArenaState) -> Router {
    Router::new()
        .route("/api/rooms", get(list_rooms).post(create_room))
        .route("/api/rooms/{id}", get(get_room))
        .route("/api/leaderboard", get(leaderboard))
        .route("/api/players/{user_id}/matches", get(match_history))
        .route("/api/questions", post(fetch_questions))
        .with_state(state)
}

async fn list_rooms(
    State(state): State<ArenaState>,
    Query(query): Query<ListRoomsQuery>,
) -> Json<Vec<RoomView>> {
    let filter = RoomFilter {
        one_vs_one_only: query.mode.as_deref() == Some("1v1"),
        public_only: query.public.unwrap_or(false),
    };
    Json(state.registry().list(&filter))
}

async fn create_room(
    State(state): State<ArenaState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<CreatedRoom>), ApiError> {
    let created = state.registry().create(request)?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_room(State(state): State<ArenaState>, Path(id): Path<String>) -> ApiResult<RoomView> {
    let room_id = Uuid::parse_str(&id).map_err(|_| ArenaError::RoomNotFound)?;
    let room = state
        .registry()
        .get(room_id)
        .ok_or(ArenaError::RoomNotFound)?;
    Ok(Json(room.view()))
}

async fn leaderboard(
    State(state): State<ArenaState>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries = state
        .profiles()
        .leaderboard(limit)?
        .into_iter()
        .enumerate()
        .map(|(index, profile)| LeaderboardEntry::from_profile(index + 1, profile))
        .collect();
    Ok(Json(entries))
}

async fn match_history(
    State(state): State<ArenaState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<MatchPage> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query
        .page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    Ok(Json(
        state.profiles().match_history(&user_id, page, page_size)?,
    ))
}

async fn fetch_questions(
    State(state): State<ArenaState>,
    Json(body): Json<QuestionsBody>,
) -> ApiResult<QuestionsResponse> {
    let category = match body.category.as_deref() {
        Some(category) => validation::validate_room_name(category)?,
        None => "general".to_string(),
    };
    let count = body.count.unwrap_or(DEFAULT_QUESTION_COUNT);
    if !(1..=MAX_QUESTION_COUNT).contains(&count) {
        return Err(ArenaError::InvalidInput.into());
    }

    let request = QuestionRequest::new(body.difficulty.unwrap_or_default(), category, count);
    let questions = state.questions().fetch(&request).await?;
    info!(
        "Served {} questions from {} ({} / {})",
        questions.len(),
        state.questions().name(),
        request.category,
        request.difficulty
    );
    Ok(Json(QuestionsResponse { questions }))
}
