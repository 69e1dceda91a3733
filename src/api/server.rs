use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::extract::MatchedPath;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::auth::{AuthError, AuthService};
use crate::engine::profile::ProfileService;
use crate::engine::rewards::RewardService;
use crate::engine::trips::TripService;
use crate::engine::EngineError;
use crate::store::StoreError;
use crate::util::env;

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub trips: TripService,
    pub rewards: RewardService,
    pub profile: ProfileService,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
        .allow_origin(Any);

    let api = Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        //
        // trips + ranking
        .route("/trips", get(list_trips).post(create_trip))
        .route("/trips/{id}", get(get_trip))
        .route("/leaderboard", get(leaderboard))
        //
        // rewards
        .route("/rewards", get(list_rewards))
        .route("/rewards/redeem", post(redeem_reward))
        //
        // the caller's own data
        .route("/me", get(me))
        .route("/me/history", get(me_history))
        .route("/me/redemptions", get(me_redemptions))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api)
        .route("/checkhealth", get(|| async { "SERVER_OK" }))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(cors)
}

/// Bind and serve until the process is stopped.
#[instrument(skip(state))]
pub async fn serve(state: Arc<AppState>) -> std::io::Result<()> {
    let port = env::env().server_api_port;
    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(
        server_url = &format!("http://127.0.0.1:{port}"),
        "server ready"
    );

    axum::serve(listener, router(state)).await
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{0}")]
    Validation(String),

    #[error("missing or malformed bearer token")]
    MissingToken,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        let status = match &self {
            RouteError::Validation(_) => StatusCode::BAD_REQUEST,
            RouteError::MissingToken => StatusCode::UNAUTHORIZED,
            RouteError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::Duplicate => StatusCode::CONFLICT,
                AuthError::Validation(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            RouteError::Engine(err) => match err {
                EngineError::NoMediaProvided
                | EngineError::InvalidChecksumFormat
                | EngineError::MissingMetadata
                | EngineError::MalformedMetadata
                | EngineError::MissingCaptureTime
                | EngineError::InvalidCoordinates
                | EngineError::InconsistentCaptureTime => StatusCode::BAD_REQUEST,

                EngineError::RewardNotFound => StatusCode::NOT_FOUND,
                EngineError::RewardUnavailable | EngineError::InsufficientPoints => {
                    StatusCode::CONFLICT
                }
                EngineError::LeaderboardUnavailable => StatusCode::SERVICE_UNAVAILABLE,

                EngineError::Storage(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "error occurred inside route handler");
        }

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
