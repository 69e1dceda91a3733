use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::middleware::AuthedUser;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::constants::{DEFAULT_HISTORY_LIMIT, DEFAULT_LEADERBOARD_LIMIT, DEFAULT_TRIPS_LIMIT};
use crate::db::models::{
    PointsHistoryEntry, Redemption, Reward, RewardId, Trip, TripId, User,
};
use crate::engine::profile::Profile;
use crate::engine::trips::CreateTrip;
use crate::leaderboard::LeaderboardEntry;

#[inline]
const fn default_trips_limit() -> i64 {
    DEFAULT_TRIPS_LIMIT
}

#[inline]
const fn default_leaderboard_limit() -> i64 {
    DEFAULT_LEADERBOARD_LIMIT
}

#[inline]
const fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct TripsQuery {
    #[serde(default = "default_trips_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct RedeemInput {
    pub reward_id: RewardId,
}

#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    pub redemption: Redemption,
    pub user: User,
}

#[instrument(skip(state, input))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(input): Json<RegisterInput>,
) -> Result<(StatusCode, Json<User>), RouteError> {
    let user = state
        .auth
        .register(&input.username, &input.email, &input.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, input))]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(input): Json<LoginInput>,
) -> JsonResult<LoginResponse> {
    let (token, user) = state.auth.login(&input.email, &input.password).await?;
    Ok(Json(LoginResponse { token, user }))
}

#[instrument(skip(state, input), fields(user = %user.0))]
pub async fn create_trip(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(input): Json<CreateTrip>,
) -> Result<(StatusCode, Json<Trip>), RouteError> {
    for (field, value) in [
        ("title", &input.title),
        ("description", &input.description),
        ("location", &input.location),
    ] {
        if value.trim().is_empty() {
            return Err(RouteError::Validation(format!("{field} is required")));
        }
    }

    let trip = state.trips.create_trip(user.0, input).await?;
    Ok((StatusCode::CREATED, Json(trip)))
}

#[instrument(skip(state))]
pub async fn list_trips(
    Query(param): Query<TripsQuery>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<Trip>> {
    let limit = if param.limit > 0 {
        param.limit
    } else {
        DEFAULT_TRIPS_LIMIT
    };
    Ok(Json(state.trips.list_trips(limit).await?))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> JsonResult<Trip> {
    Ok(Json(state.trips.trip(TripId(id)).await?))
}

#[instrument(skip(state))]
pub async fn leaderboard(
    Query(param): Query<LeaderboardQuery>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<Vec<LeaderboardEntry>> {
    let limit = if param.limit > 0 {
        param.limit
    } else {
        DEFAULT_LEADERBOARD_LIMIT
    };
    Ok(Json(state.trips.leaderboard_top(limit).await?))
}

#[instrument(skip(state))]
pub async fn list_rewards(State(state): State<Arc<AppState>>) -> JsonResult<Vec<Reward>> {
    Ok(Json(state.rewards.list_rewards().await?))
}

#[instrument(skip(state, input), fields(user = %user.0))]
pub async fn redeem_reward(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Json(input): Json<RedeemInput>,
) -> Result<(StatusCode, Json<RedeemResponse>), RouteError> {
    let (redemption, updated) = state.rewards.redeem(user.0, input.reward_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(RedeemResponse {
            redemption,
            user: updated,
        }),
    ))
}

#[instrument(skip(state), fields(user = %user.0))]
pub async fn me(State(state): State<Arc<AppState>>, user: AuthedUser) -> JsonResult<Profile> {
    Ok(Json(state.profile.profile(user.0).await?))
}

#[instrument(skip(state), fields(user = %user.0))]
pub async fn me_history(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Query(param): Query<HistoryQuery>,
) -> JsonResult<Vec<PointsHistoryEntry>> {
    Ok(Json(state.profile.points_history(user.0, param.limit).await?))
}

#[instrument(skip(state), fields(user = %user.0))]
pub async fn me_redemptions(
    State(state): State<Arc<AppState>>,
    user: AuthedUser,
    Query(param): Query<HistoryQuery>,
) -> JsonResult<Vec<Redemption>> {
    Ok(Json(state.profile.redemptions(user.0, param.limit).await?))
}
