//! Datastore traits
//!
//! The API layer talks to persistence only through these traits so the
//! same handlers run against PostgreSQL in production and against the
//! in-memory store in development and tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Category, NewProduct, NewUser, Product, ProductUpdate, User};
use crate::Result;

/// Trait for user record operations
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user. Fails with `MarketError::Conflict` when the username
    /// (case-insensitive) or email is already taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Get user by ID
    async fn find_user(&self, id: Uuid) -> Result<Option<User>>;

    /// Find a user whose username OR email matches; either may be omitted
    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>>;

    /// Overwrite (or clear, with `None`) the stored refresh token.
    /// Fails with `MarketError::NotFound` if the user does not exist.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<()>;

    /// Replace the stored refresh token only if it still equals `expected`.
    /// Returns `false` when the stored value differs or the user is gone.
    async fn swap_refresh_token(&self, id: Uuid, expected: &str, replacement: &str)
        -> Result<bool>;

    /// Delete a user, returning whether a record was removed
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
}

/// Trait for product catalogue operations
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Store a new product
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Get product by ID
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    /// List products, newest first, optionally filtered by category
    async fn list_products(&self, category: Option<Category>) -> Result<Vec<Product>>;

    /// Apply a partial update; `None` if the product does not exist
    async fn update_product(&self, id: Uuid, update: ProductUpdate) -> Result<Option<Product>>;

    /// Delete product, returning whether a record was removed
    async fn delete_product(&self, id: Uuid) -> Result<bool>;
}
