//! Caller identity supplied by the upstream authenticator.
//!
//! Users arrive with `x-user-id`; internal tooling presents
//! `x-internal-token` matching the configured secret.

use super::AppState;
use super::error::ApiError;
use crate::application::Caller;
use crate::error::BookingError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const INTERNAL_TOKEN_HEADER: &str = "x-internal-token";

/// An authenticated end user.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

/// A user or the system caller.
#[derive(Debug, Clone, Copy)]
pub struct CallerIdentity(pub Caller);

/// Internal callers only.
#[derive(Debug, Clone, Copy)]
pub struct SystemCaller;

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

fn user_from(parts: &Parts) -> Option<Uuid> {
    header(parts, USER_ID_HEADER).and_then(|v| Uuid::parse_str(v.trim()).ok())
}

/// Compares digests so the check does not leak the token length or prefix.
fn token_matches(presented: &str, expected: &str) -> bool {
    Sha256::digest(presented.as_bytes()) == Sha256::digest(expected.as_bytes())
}

/// `Some(true)` for a valid token, `Some(false)` for a wrong one, `None` when
/// no token was presented.
fn system_token(parts: &Parts, state: &AppState) -> Option<bool> {
    let presented = header(parts, INTERNAL_TOKEN_HEADER)?;
    Some(
        state
            .internal_token
            .as_deref()
            .is_some_and(|expected| token_matches(presented, expected)),
    )
}

#[async_trait]
impl FromRequestParts<AppState> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self, Self::Rejection> {
        user_from(parts)
            .map(Self)
            .ok_or_else(|| BookingError::Unauthenticated.into())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match system_token(parts, state) {
            Some(true) => Ok(Self(Caller::System)),
            Some(false) => Err(BookingError::Unauthenticated.into()),
            None => user_from(parts)
                .map(|id| Self(Caller::User(id)))
                .ok_or_else(|| BookingError::Unauthenticated.into()),
        }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SystemCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match system_token(parts, state) {
            Some(true) => Ok(Self),
            Some(false) => Err(BookingError::Unauthenticated.into()),
            None if user_from(parts).is_some() => Err(BookingError::Forbidden.into()),
            None => Err(BookingError::Unauthenticated.into()),
        }
    }
}
