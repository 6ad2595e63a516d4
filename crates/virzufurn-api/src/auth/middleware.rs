//! Request authorization filter
//!
//! Reads the access token from the `accessToken` cookie or a
//! `Authorization: Bearer` header, runs it through
//! [`TokenAuthority::authorize`](super::authority::TokenAuthority::authorize)
//! and, on success, puts an [`AuthenticatedUser`] into the request extensions.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use virzufurn_core::UserRole;

use super::cookies::ACCESS_TOKEN_COOKIE;
use super::jwt::JwtError;
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;

/// The caller of an authorized request
///
/// Handlers extract it with `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    /// ID of the access token used
    pub jti: String,
}

/// Authentication and authorization failures
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized request")]
    MissingToken,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),

    #[error("Invalid token: user no longer exists")]
    UnknownUser,

    #[error("Refresh token is expired or used")]
    StaleRefreshToken { user_id: Uuid },

    #[error("Access denied: requires role {required}")]
    Forbidden {
        user_id: Uuid,
        role: UserRole,
        required: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Access token from the cookie, falling back to the bearer header
pub fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Require a valid access token for any role
///
/// ```ignore
/// let protected = Router::new()
///     .route("/logout", post(auth::logout_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    gate(&state, request, next, &[]).await
}

type RoleMiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Require a valid access token whose user holds one of `roles`
///
/// ```ignore
/// let sellers = Router::new()
///     .route("/seller-dashboard", get(dashboard::seller_dashboard))
///     .route_layer(middleware::from_fn_with_state(
///         state.clone(),
///         require_roles(&[UserRole::Seller]),
///     ));
/// ```
pub fn require_roles(
    roles: &'static [UserRole],
) -> impl Fn(State<Arc<AppState>>, Request<Body>, Next) -> RoleMiddlewareFuture + Clone {
    move |State(state): State<Arc<AppState>>, request: Request<Body>, next: Next| {
        Box::pin(async move { gate(&state, request, next, roles).await })
    }
}

async fn gate(
    state: &AppState,
    mut request: Request<Body>,
    next: Next,
    roles: &[UserRole],
) -> Result<Response, AuthError> {
    let token = extract_access_token(request.headers());

    match state.authority.authorize(token.as_deref(), roles).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(err) => {
            let context = RequestContext::from_headers(request.headers());
            let resource = request.uri().path().to_string();

            match &err {
                AuthError::InvalidToken(_) | AuthError::UnknownUser => {
                    audit_log(&AuditEvent::InvalidToken {
                        reason: err.to_string(),
                        resource,
                        context,
                    });
                }
                AuthError::Forbidden {
                    user_id,
                    role,
                    required,
                } => {
                    audit_log(&AuditEvent::AccessDenied {
                        user_id: *user_id,
                        role: role.to_string(),
                        required_role: required.clone(),
                        resource,
                        context,
                    });
                }
                AuthError::MissingToken
                | AuthError::StaleRefreshToken { .. }
                | AuthError::Internal(_) => {}
            }

            Err(err)
        }
    }
}
