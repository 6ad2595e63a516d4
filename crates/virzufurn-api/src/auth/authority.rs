//! Token Authority
//!
//! Issues, verifies and rotates the access/refresh token pair, and decides
//! whether a request may proceed. The user record holds exactly one accepted
//! refresh token; rotation replaces it through a compare-and-swap so that two
//! refreshes racing with the same token cannot both succeed.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use virzufurn_core::{User, UserRole, UserStore};

use super::jwt::{
    generate_access_token, generate_refresh_token, validate_access_token, validate_refresh_token,
    Claims, JwtConfig,
};
use super::middleware::{AuthError, AuthenticatedUser};

/// Freshly minted credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub struct TokenAuthority {
    config: JwtConfig,
    users: Arc<dyn UserStore>,
}

impl TokenAuthority {
    pub fn new(config: JwtConfig, users: Arc<dyn UserStore>) -> Self {
        Self { config, users }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Mint a pair for `user_id` and store its refresh token, replacing any
    /// previous one.
    pub async fn issue_token_pair(&self, user_id: Uuid) -> Result<TokenPair, AuthError> {
        let user = self
            .users
            .find_user(user_id)
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to load user {user_id}: {e}")))?
            .ok_or_else(|| {
                AuthError::Internal(format!("User {user_id} not found while issuing tokens"))
            })?;

        let tokens = self.mint(&user)?;
        self.users
            .set_refresh_token(user.id, Some(&tokens.refresh_token))
            .await
            .map_err(|e| AuthError::Internal(format!("Failed to store refresh token: {e}")))?;

        tracing::debug!(user_id = %user.id, "Issued token pair");
        Ok(tokens)
    }

    /// Check signature, issuer, kind and expiry of an access token
    pub fn verify_access(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(validate_access_token(&self.config, token)?)
    }

    /// Exchange the stored refresh token for a new pair.
    ///
    /// Returns the owning user's id alongside the pair. Any mismatch, whether
    /// an older token or a concurrent refresh that got there first, fails
    /// with `StaleRefreshToken`.
    pub async fn refresh(&self, presented: &str) -> Result<(Uuid, TokenPair), AuthError> {
        let claims = validate_refresh_token(&self.config, presented)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .find_user(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UnknownUser)?;

        if user.refresh_token.as_deref() != Some(presented) {
            return Err(AuthError::StaleRefreshToken { user_id });
        }

        let tokens = self.mint(&user)?;
        let swapped = self
            .users
            .swap_refresh_token(user_id, presented, &tokens.refresh_token)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !swapped {
            return Err(AuthError::StaleRefreshToken { user_id });
        }

        Ok((user_id, tokens))
    }

    /// Clear the stored refresh token. Revoking twice, or revoking a user
    /// that no longer exists, is not an error.
    pub async fn revoke(&self, user_id: Uuid) -> Result<(), AuthError> {
        match self.users.set_refresh_token(user_id, None).await {
            Ok(()) | Err(virzufurn_core::MarketError::NotFound(_)) => Ok(()),
            Err(e) => Err(AuthError::Internal(e.to_string())),
        }
    }

    /// Per-request gate. An empty `allowed` set admits any authenticated role.
    ///
    /// The role is read from the current user record rather than the token,
    /// so a deleted account loses access immediately.
    pub async fn authorize(
        &self,
        token: Option<&str>,
        allowed: &[UserRole],
    ) -> Result<AuthenticatedUser, AuthError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let claims = self.verify_access(token)?;
        let user_id = claims.user_id()?;

        let user = self
            .users
            .find_user(user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::UnknownUser)?;

        if !allowed.is_empty() && !allowed.contains(&user.role) {
            return Err(AuthError::Forbidden {
                user_id: user.id,
                role: user.role,
                required: allowed
                    .iter()
                    .map(UserRole::as_str)
                    .collect::<Vec<_>>()
                    .join(" or "),
            });
        }

        Ok(AuthenticatedUser {
            user_id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            jti: claims.jti,
        })
    }

    fn mint(&self, user: &User) -> Result<TokenPair, AuthError> {
        let access_token = generate_access_token(&self.config, user)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let refresh_token = generate_refresh_token(&self.config, user.id)
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }
}
