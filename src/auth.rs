use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use sha2::{Digest, Sha512};

use crate::{error::AppError, state::AppState};

/// Gate for back-office write operations. The wider authentication story
/// (sessions, user accounts) lives outside this service; handlers only need
/// a yes/no on the shared admin token.
#[derive(Debug, Clone)]
pub struct AdminGate;

#[async_trait]
impl FromRequestParts<AppState> for AdminGate {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        if token_digest(presented) == state.admin_token_digest {
            Ok(Self)
        } else {
            Err(AppError::Unauthorized)
        }
    }
}

pub fn token_digest(token: &str) -> Vec<u8> {
    Sha512::digest(token.as_bytes()).to_vec()
}
