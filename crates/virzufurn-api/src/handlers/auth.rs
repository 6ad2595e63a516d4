//! User account handlers
//!
//! Mounted under `/api/v1/users`. Successful register, login and refresh
//! set both token cookies and also return the tokens in the body for clients
//! that cannot use cookies.

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use virzufurn_core::UserPublic;

use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::auth::cookies::{with_session, without_session, REFRESH_TOKEN_COOKIE};
use crate::auth::{
    AuthError, AuthResponse, AuthenticatedUser, LoginRequest, RegisterRequest, TokenPair,
};
use crate::error::{ApiResponse, AppError, ErrorEnvelope};
use crate::state::AppState;

/// Refresh request body; the `refreshToken` cookie takes precedence
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/api/v1/users/register",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, description = "Missing field or invalid role", body = ErrorEnvelope),
        (status = 409, description = "Username or email taken", body = ErrorEnvelope),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(request), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let username = request.username.clone();
    let email = request.email.clone();

    let response = match state.accounts.register(request).await {
        Ok(response) => response,
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username,
                email,
                reason: e.to_string(),
                context,
            });
            return Err(e);
        }
    };

    audit_log(&AuditEvent::RegistrationSuccess {
        user_id: response.user.id,
        username: response.user.username.clone(),
        role: response.user.role.to_string(),
        context,
    });

    let jar = with_session(jar, &response.tokens(), state.secure_cookies());
    Ok((
        jar,
        ApiResponse::created(response, "User registered successfully"),
    ))
}

/// Log in with username or email
#[utoipa::path(
    post,
    path = "/api/v1/users/login",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 400, description = "Missing identifier or password", body = ErrorEnvelope),
        (status = 401, description = "Invalid credentials", body = ErrorEnvelope),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);
    let identity = request
        .username
        .clone()
        .or_else(|| request.email.clone())
        .unwrap_or_default();

    let response = match state.accounts.login(request).await {
        Ok(response) => response,
        Err(e) => {
            if matches!(e, AppError::Unauthorized(_)) {
                audit_log(&AuditEvent::LoginFailure {
                    identity,
                    reason: e.to_string(),
                    context,
                });
            }
            return Err(e);
        }
    };

    audit_log(&AuditEvent::LoginSuccess {
        user_id: response.user.id,
        username: response.user.username.clone(),
        context,
    });

    let jar = with_session(jar, &response.tokens(), state.secure_cookies());
    Ok((jar, ApiResponse::ok(response, "User logged in successfully")))
}

/// Log out: forget the stored refresh token and clear both cookies
#[utoipa::path(
    post,
    path = "/api/v1/users/logout",
    tag = "users",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Missing or invalid access token", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    state.accounts.logout(user.user_id).await?;

    audit_log(&AuditEvent::Logout {
        user_id: user.user_id,
        context: RequestContext::from_headers(&headers),
    });

    let jar = without_session(jar, state.secure_cookies());
    Ok((
        jar,
        ApiResponse::ok(serde_json::json!({}), "User logged out"),
    ))
}

/// Exchange the current refresh token for a new pair
#[utoipa::path(
    post,
    path = "/api/v1/users/refresh-token",
    tag = "users",
    request_body(content = RefreshRequest, description = "Optional when the refreshToken cookie is sent"),
    responses(
        (status = 200, description = "Tokens rotated", body = TokenPair),
        (status = 401, description = "Missing, invalid, expired or superseded token", body = ErrorEnvelope),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let context = RequestContext::from_headers(&headers);

    let from_cookie = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    let presented = from_cookie
        .or_else(|| {
            serde_json::from_slice::<RefreshRequest>(&body)
                .ok()
                .and_then(|r| r.refresh_token)
                .filter(|v| !v.trim().is_empty())
        })
        .ok_or(AuthError::MissingToken)?;

    let tokens = match state.authority.refresh(&presented).await {
        Ok((user_id, tokens)) => {
            audit_log(&AuditEvent::TokenRefresh { user_id, context });
            tokens
        }
        Err(err) => {
            match &err {
                AuthError::StaleRefreshToken { user_id } => {
                    audit_log(&AuditEvent::RefreshTokenReuse {
                        user_id: *user_id,
                        context,
                    });
                }
                AuthError::InvalidToken(_) | AuthError::UnknownUser => {
                    audit_log(&AuditEvent::InvalidToken {
                        reason: err.to_string(),
                        resource: "/api/v1/users/refresh-token".to_string(),
                        context,
                    });
                }
                _ => {}
            }
            return Err(err.into());
        }
    };

    let jar = with_session(jar, &tokens, state.secure_cookies());
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

/// Profile of the authenticated user
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Missing or invalid access token", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.accounts.current_user(user.user_id).await?;
    Ok(ApiResponse::new(
        StatusCode::OK,
        Some(profile),
        "Current user fetched",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_request_deserialization() {
        let request: RefreshRequest =
            serde_json::from_str(r#"{"refreshToken":"abc"}"#).unwrap();
        assert_eq!(request.refresh_token.as_deref(), Some("abc"));

        let empty: RefreshRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.refresh_token.is_none());
    }
}
