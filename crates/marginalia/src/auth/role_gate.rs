//! Role gate
//!
//! Derives the caller's role from the `X-User-Role` header. The role is an
//! unverified client assertion; `RoleResolver` is the seam where a real
//! authenticator (tokens, signatures) plugs in without touching the services.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use crate::error::{LibraryError, LibraryResult};
use crate::routes::AppState;
use crate::security::Role;

/// Header carrying the asserted role
pub const HEADER_USER_ROLE: &str = "X-User-Role";

/// Resolves the caller's role from request headers
pub trait RoleResolver: Send + Sync {
    fn resolve(&self, headers: &HeaderMap) -> LibraryResult<Role>;
}

/// Trusts the role token supplied in `X-User-Role`
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderRoleGate;

impl HeaderRoleGate {
    /// Classify a raw token
    pub fn classify(token: Option<&str>) -> LibraryResult<Role> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| LibraryError::InvalidRole(format!("{} header is missing", HEADER_USER_ROLE)))?;
        token.parse::<Role>().map_err(LibraryError::InvalidRole)
    }
}

impl RoleResolver for HeaderRoleGate {
    fn resolve(&self, headers: &HeaderMap) -> LibraryResult<Role> {
        let raw = match headers.get(HEADER_USER_ROLE) {
            Some(value) => Some(value.to_str().map_err(|_| {
                LibraryError::InvalidRole(format!("{} is not valid text", HEADER_USER_ROLE))
            })?),
            None => None,
        };
        Self::classify(raw)
    }
}

/// Resolve the role for every request and expose it as an `Extension<Role>`.
/// Unrecognized callers never reach a handler.
pub async fn role_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match state.roles.resolve(request.headers()) {
        Ok(role) => {
            debug!(%role, path = %request.uri().path(), "role resolved");
            request.extensions_mut().insert(role);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), "role rejected: {}", e);
            e.into_response()
        }
    }
}
