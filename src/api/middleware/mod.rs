//! Request authentication: bearer-token extraction for protected routes.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::api::server::{AppState, RouteError};
use crate::db::models::UserId;

/// The verified caller, extracted from the `Authorization` header. Adding
/// this to a handler's signature is what makes the route protected.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub UserId);

impl FromRequestParts<Arc<AppState>> for AuthedUser {
    type Rejection = RouteError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(RouteError::MissingToken)?;

        let mut split = header.splitn(2, ' ');
        let token = match (split.next(), split.next()) {
            (Some(scheme), Some(token)) if scheme.eq_ignore_ascii_case("bearer") => token,
            _ => return Err(RouteError::MissingToken),
        };

        let claims = state.auth.verify_token(token)?;
        Ok(AuthedUser(claims.user_id()))
    }
}
