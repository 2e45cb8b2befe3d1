//! Session authentication and role gates

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::{error::ApiError, models::Role, state::AppState};

/// Authenticated user information
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
    /// Session token the request was authenticated with
    pub token: String,
}

/// Raw session token from the `Authorization` header
///
/// The header carries the bare token; blank values count as absent.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// Resolves the session token to a user and stores an [`AuthUser`] in the
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(req.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing session token"))?
        .to_string();

    let user = state
        .session_repository
        .find_user_by_token(&token)
        .await?
        .ok_or_else(|| {
            warn!("Rejected invalid or expired session token");
            ApiError::unauthorized("Invalid or expired session token")
        })?;

    debug!("Authenticated user {} ({})", user.id, user.role);
    req.extensions_mut().insert(AuthUser {
        id: user.id,
        role: user.role,
        token,
    });

    Ok(next.run(req).await)
}

fn current_user(req: &Request) -> Result<&AuthUser, ApiError> {
    req.extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// Only admins pass
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    if !current_user(&req)?.role.is_admin() {
        return Err(ApiError::forbidden("Admin access required"));
    }

    Ok(next.run(req).await)
}

/// Trainers and admins pass
pub async fn require_trainer_or_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    if !current_user(&req)?.role.is_staff() {
        return Err(ApiError::forbidden("Trainer or admin access required"));
    }

    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_token_is_raw_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("   "));
        assert_eq!(session_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static(" abc123 "));
        assert_eq!(session_token(&headers), Some("abc123"));
    }
}
