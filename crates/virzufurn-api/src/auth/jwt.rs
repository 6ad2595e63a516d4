//! JWT token generation and validation
//!
//! Access and refresh tokens are both HS256 JWTs, signed with different
//! secrets and tagged with a `typ` claim so neither can stand in for the other.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use uuid::Uuid;
use virzufurn_core::{AuthConfig, User, UserRole};

/// Which of the two credentials a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims structure
///
/// Refresh tokens carry only the registered claims; access tokens also embed
/// the user's role and identity so handlers need no store lookup to log them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    /// Subject - user ID
    pub sub: String,
    /// Random per token, so two tokens minted in the same second still differ
    pub jti: String,
    pub iat: u64,
    pub exp: u64,
    pub typ: TokenKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    /// Parse the subject back into a user id
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|_| JwtError::InvalidToken)
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Expected a {expected:?} token")]
    WrongTokenKind { expected: TokenKind },

    #[error("System time error: {0}")]
    SystemTimeError(#[from] std::time::SystemTimeError),
}

/// JWT Configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub access_expiration_secs: u64,
    pub refresh_secret: String,
    pub refresh_expiration_secs: u64,
    pub issuer: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self::from(&AuthConfig::default())
    }
}

impl From<&AuthConfig> for JwtConfig {
    fn from(config: &AuthConfig) -> Self {
        Self {
            access_secret: config.access_token_secret.clone(),
            access_expiration_secs: config.access_token_expiry_secs,
            refresh_secret: config.refresh_token_secret.clone(),
            refresh_expiration_secs: config.refresh_token_expiry_secs,
            issuer: config.issuer.clone(),
        }
    }
}

impl JwtConfig {
    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.access_secret.as_bytes(),
            TokenKind::Refresh => self.refresh_secret.as_bytes(),
        }
    }

    fn lifetime(&self, kind: TokenKind) -> u64 {
        match kind {
            TokenKind::Access => self.access_expiration_secs,
            TokenKind::Refresh => self.refresh_expiration_secs,
        }
    }
}

fn base_claims(config: &JwtConfig, user_id: Uuid, kind: TokenKind) -> Result<Claims, JwtError> {
    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();

    Ok(Claims {
        iss: config.issuer.clone(),
        sub: user_id.to_string(),
        jti: Uuid::new_v4().to_string(),
        iat: now,
        exp: now + config.lifetime(kind),
        typ: kind,
        role: None,
        username: None,
        email: None,
    })
}

fn sign(config: &JwtConfig, claims: &Claims) -> Result<String, JwtError> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(config.secret(claims.typ)),
    )?;
    Ok(token)
}

/// Generate an access token for `user`
pub fn generate_access_token(config: &JwtConfig, user: &User) -> Result<String, JwtError> {
    let mut claims = base_claims(config, user.id, TokenKind::Access)?;
    claims.role = Some(user.role);
    claims.username = Some(user.username.clone());
    claims.email = Some(user.email.clone());
    sign(config, &claims)
}

/// Generate a refresh token for `user_id`
pub fn generate_refresh_token(config: &JwtConfig, user_id: Uuid) -> Result<String, JwtError> {
    let claims = base_claims(config, user_id, TokenKind::Refresh)?;
    sign(config, &claims)
}

/// Validate an access token and extract claims
pub fn validate_access_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    validate(config, token, TokenKind::Access)
}

/// Validate a refresh token and extract claims
pub fn validate_refresh_token(config: &JwtConfig, token: &str) -> Result<Claims, JwtError> {
    validate(config, token, TokenKind::Refresh)
}

fn validate(config: &JwtConfig, token: &str, kind: TokenKind) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret(kind)),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
        jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        _ => JwtError::InvalidToken,
    })?;

    if token_data.claims.typ != kind {
        return Err(JwtError::WrongTokenKind { expected: kind });
    }

    Ok(token_data.claims)
}
