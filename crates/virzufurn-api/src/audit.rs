//! Security audit logging for authentication events
//!
//! Every event is emitted at INFO level on the `audit` tracing target with a
//! few indexed fields plus the whole event serialized as JSON, so security
//! logs can be routed separately from application logs:
//!
//! ```text
//! RUST_LOG=audit=info,virzufurn_api=warn
//! ```

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Client metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    RegistrationSuccess {
        user_id: Uuid,
        username: String,
        role: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    RegistrationFailure {
        username: Option<String>,
        email: Option<String>,
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    LoginSuccess {
        user_id: Uuid,
        username: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// Bad credentials; `identity` is whatever username or email was sent
    LoginFailure {
        identity: String,
        reason: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    Logout {
        user_id: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    TokenRefresh {
        user_id: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    /// A validly signed refresh token that is no longer the stored one
    RefreshTokenReuse {
        user_id: Uuid,
        #[serde(flatten)]
        context: RequestContext,
    },

    AccessDenied {
        user_id: Uuid,
        role: String,
        required_role: String,
        resource: String,
        #[serde(flatten)]
        context: RequestContext,
    },

    InvalidToken {
        reason: String,
        resource: String,
        #[serde(flatten)]
        context: RequestContext,
    },
}

impl AuditEvent {
    /// Short human readable summary used as the log message
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RefreshTokenReuse { .. } => "Superseded refresh token presented",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::Logout { user_id, .. }
            | AuditEvent::TokenRefresh { user_id, .. }
            | AuditEvent::RefreshTokenReuse { user_id, .. }
            | AuditEvent::AccessDenied { user_id, .. } => Some(*user_id),
            AuditEvent::RegistrationFailure { .. }
            | AuditEvent::LoginFailure { .. }
            | AuditEvent::InvalidToken { .. } => None,
        }
    }

    pub fn context(&self) -> &RequestContext {
        match self {
            AuditEvent::RegistrationSuccess { context, .. }
            | AuditEvent::RegistrationFailure { context, .. }
            | AuditEvent::LoginSuccess { context, .. }
            | AuditEvent::LoginFailure { context, .. }
            | AuditEvent::Logout { context, .. }
            | AuditEvent::TokenRefresh { context, .. }
            | AuditEvent::RefreshTokenReuse { context, .. }
            | AuditEvent::AccessDenied { context, .. }
            | AuditEvent::InvalidToken { context, .. } => context,
        }
    }
}

/// Log a security audit event with structured fields
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        timestamp = %Utc::now(),
        event = %event_json,
        user_id = ?event.user_id(),
        ip_address = ?event.context().ip_address,
        "{}",
        event.summary()
    );
}

/// Client IP from `X-Forwarded-For` (first hop) or `X-Real-IP`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first_ip) = xff.split(',').next() {
            let first_ip = first_ip.trim();
            if !first_ip.is_empty() {
                return Some(first_ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(str::to_string)
}
