//! Account service
//!
//! Registration, login, logout and profile lookup on top of the user store
//! and the [`TokenAuthority`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use virzufurn_core::{NewUser, User, UserPublic, UserRole, UserStore};

use super::authority::{TokenAuthority, TokenPair};
use super::password::{hash_password, verify_password, PasswordConfig};
use crate::error::AppError;

const INVALID_CREDENTIALS: &str = "Invalid user credentials";

/// User registration request
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// `customer` or `seller`
    pub role: Option<String>,
}

/// Login request; either `username` or `email` identifies the account
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Successful registration or login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserPublic,
    pub access_token: String,
    pub refresh_token: String,
    /// Where the client should go next, per role
    pub dashboard_url: String,
}

impl AuthResponse {
    fn new(user: &User, tokens: TokenPair) -> Self {
        Self {
            user: user.to_public(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            dashboard_url: user.role.dashboard_path().to_string(),
        }
    }

    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Trimmed, non-empty value of an optional field
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Passwords are checked for blankness but kept exactly as sent
fn present_secret(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserStore>,
    authority: TokenAuthority,
    password: PasswordConfig,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserStore>,
        authority: TokenAuthority,
        password: PasswordConfig,
    ) -> Self {
        Self {
            users,
            authority,
            password,
        }
    }

    /// Create an account and sign it in
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AppError> {
        let (Some(full_name), Some(username), Some(email), Some(password), Some(role)) = (
            present(&request.full_name),
            present(&request.username),
            present(&request.email),
            present_secret(&request.password),
            present(&request.role),
        ) else {
            return Err(AppError::Validation("All fields are required".to_string()));
        };

        let role: UserRole = role.parse()?;

        if self
            .users
            .find_by_identity(Some(username), Some(email))
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let password_hash = self.hash(password).await?;

        // The store enforces uniqueness again, covering a concurrent registration
        let user = self
            .users
            .create_user(NewUser {
                full_name: full_name.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role,
            })
            .await?;

        let tokens = self.authority.issue_token_pair(user.id).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(AuthResponse::new(&user, tokens))
    }

    /// Check credentials and issue a fresh pair
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AppError> {
        let username = present(&request.username);
        let email = present(&request.email);
        if username.is_none() && email.is_none() {
            return Err(AppError::Validation(
                "Username or email is required".to_string(),
            ));
        }

        let password = present_secret(&request.password)
            .ok_or_else(|| AppError::Validation("Password is required".to_string()))?;

        let user = self
            .users
            .find_by_identity(username, email)
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !self.verify(password, &user.password_hash).await? {
            return Err(AppError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let tokens = self.authority.issue_token_pair(user.id).await?;
        Ok(AuthResponse::new(&user, tokens))
    }

    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        Ok(self.authority.revoke(user_id).await?)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<UserPublic, AppError> {
        self.users
            .find_user(user_id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    // Argon2 is CPU bound; keep it off the async workers
    async fn hash(&self, password: &str) -> Result<String, AppError> {
        let config = self.password.clone();
        let password = password.to_string();

        let hash = tokio::task::spawn_blocking(move || hash_password(&password, &config))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {e}")))??;
        Ok(hash)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let password = password.to_string();
        let hash = hash.to_string();

        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {e}")))??;
        Ok(valid)
    }
}
