//! Actor extractor
//!
//! The upstream auth layer puts the authenticated actor into the
//! `X-Actor-Id` / `X-Actor-Role` headers.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::core::ServerState;
use crate::orders::Actor;
use crate::utils::AppError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

impl FromRequestParts<ServerState> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let Some(raw_id) = header(ACTOR_ID_HEADER) else {
            tracing::warn!(uri = %parts.uri, "Request without actor header");
            return Err(AppError::not_authenticated());
        };
        let id = raw_id
            .parse::<i64>()
            .map_err(|_| AppError::invalid_request(format!("Invalid {ACTOR_ID_HEADER}: {raw_id}")))?;
        let role = header(ACTOR_ROLE_HEADER).unwrap_or("staff");
        Ok(Actor::new(id, role))
    }
}
