//! In-memory datastore
//!
//! Backs both store traits with `tokio::sync::RwLock`-guarded maps. Used when
//! no `DATABASE_URL` is configured and throughout the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Category, NewProduct, NewUser, Product, ProductUpdate, User};
use crate::store::{ProductStore, UserStore};
use crate::{MarketError, Result};

/// In-memory store for users and products
#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    products: RwLock<HashMap<Uuid, Product>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = User::new(user);
        let mut users = self.users.write().await;

        let taken = users
            .values()
            .any(|u| u.username == user.username || u.email == user.email);
        if taken {
            return Err(MarketError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        let username = username.map(str::to_lowercase);
        let users = self.users.read().await;

        Ok(users
            .values()
            .find(|u| {
                username.as_deref() == Some(u.username.as_str())
                    || email == Some(u.email.as_str())
            })
            .cloned())
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| MarketError::NotFound(format!("User {id}")))?;

        user.refresh_token = token.map(str::to_string);
        user.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool> {
        // Compare and write under one write guard
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) if user.refresh_token.as_deref() == Some(expected) => {
                user.refresh_token = Some(replacement.to_string());
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = Product::new(product);
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        Ok(product)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.products.read().await.get(&id).cloned())
    }

    async fn list_products(&self, category: Option<Category>) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        let mut listed: Vec<Product> = products
            .values()
            .filter(|p| category.map_or(true, |c| p.category == c))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(listed)
    }

    async fn update_product(&self, id: Uuid, update: ProductUpdate) -> Result<Option<Product>> {
        let mut products = self.products.write().await;
        Ok(products.get_mut(&id).map(|product| {
            product.apply(update);
            product.clone()
        }))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        Ok(self.products.write().await.remove(&id).is_some())
    }
}
