//! PostgreSQL datastore
//!
//! Provides user and product persistence using SQLx and PostgreSQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::{Category, NewProduct, NewUser, Product, ProductUpdate, User, UserRole};
use crate::store::{ProductStore, UserStore};
use crate::{MarketError, Result};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        full_name TEXT NOT NULL,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL CHECK (role IN ('customer', 'seller')),
        refresh_token TEXT,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        price DOUBLE PRECISION NOT NULL CHECK (price >= 0),
        display_image TEXT NOT NULL,
        model_image TEXT NOT NULL,
        stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
        category TEXT NOT NULL,
        seller_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category)",
];

const USER_COLUMNS: &str =
    "id, full_name, username, email, password_hash, role, refresh_token, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, name, description, price, display_image, model_image, stock, category, seller_id, created_at, updated_at";

/// PostgreSQL store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| MarketError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema ready");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    full_name: String,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = MarketError;

    fn try_from(row: UserRow) -> Result<Self> {
        let role: UserRole = row
            .role
            .parse()
            .map_err(|_| MarketError::DatabaseError(format!("Unknown role in row: {}", row.role)))?;

        Ok(User {
            id: row.id,
            full_name: row.full_name,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Product row from database
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: f64,
    display_image: String,
    model_image: String,
    stock: i32,
    category: String,
    seller_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = MarketError;

    fn try_from(row: ProductRow) -> Result<Self> {
        let category: Category = row.category.parse().map_err(|_| {
            MarketError::DatabaseError(format!("Unknown category in row: {}", row.category))
        })?;

        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: row.price,
            display_image: row.display_image,
            model_image: row.model_image,
            stock: row.stock,
            category,
            seller_id: row.seller_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = User::new(user);

        // Unique constraints turn a concurrent duplicate into a Conflict
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, username, email, password_hash, role, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NULL, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.full_name)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match MarketError::from(e) {
            MarketError::Conflict(_) => {
                MarketError::Conflict("Username or email already exists".to_string())
            }
            other => other,
        })?;

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_identity(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1 OR email = $2 LIMIT 1"
        ))
        .bind(username.map(str::to_lowercase))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<()> {
        let result =
            sqlx::query("UPDATE users SET refresh_token = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(token)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(MarketError::NotFound(format!("User {id}")));
        }
        Ok(())
    }

    async fn swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $3, updated_at = NOW() WHERE id = $1 AND refresh_token = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductStore for PgStore {
    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let product = Product::new(product);

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, display_image, model_image, stock, category, seller_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.display_image)
        .bind(&product.model_image)
        .bind(product.stock)
        .bind(product.category.as_str())
        .bind(product.seller_id)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(product)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Product::try_from).transpose()
    }

    async fn list_products(&self, category: Option<Category>) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE $1::TEXT IS NULL OR category = $1 ORDER BY created_at DESC"
        ))
        .bind(category.map(|c| c.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    async fn update_product(&self, id: Uuid, update: ProductUpdate) -> Result<Option<Product>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut product = Product::try_from(row)?;
        product.apply(update);

        sqlx::query(
            r#"
            UPDATE products SET
                name = $2,
                description = $3,
                price = $4,
                stock = $5,
                category = $6,
                display_image = $7,
                updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.stock)
        .bind(product.category.as_str())
        .bind(&product.display_image)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(product))
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgStore::new(&url, 2).await.unwrap();
        store.ensure_schema().await.unwrap();
        store
    }

    #[test]
    fn test_user_row_with_unknown_role_is_rejected() {
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            full_name: "X".to_string(),
            username: "x".to_string(),
            email: "x@example.com".to_string(),
            password_hash: "h".to_string(),
            role: "admin".to_string(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        assert!(matches!(
            User::try_from(row),
            Err(MarketError::DatabaseError(_))
        ));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_refresh_token_compare_and_swap() {
        let store = connect().await;
        let suffix = Uuid::new_v4().simple().to_string();
        let user = store
            .create_user(NewUser {
                full_name: "Pg User".to_string(),
                username: format!("pg{suffix}"),
                email: format!("pg{suffix}@example.com"),
                password_hash: "hash".to_string(),
                role: UserRole::Seller,
            })
            .await
            .unwrap();

        store.set_refresh_token(user.id, Some("old")).await.unwrap();
        assert!(store.swap_refresh_token(user.id, "old", "new").await.unwrap());
        assert!(!store.swap_refresh_token(user.id, "old", "newer").await.unwrap());

        let stored = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("new"));

        assert!(store.delete_user(user.id).await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_duplicate_user_conflicts() {
        let store = connect().await;
        let suffix = Uuid::new_v4().simple().to_string();
        let new_user = NewUser {
            full_name: "Dup".to_string(),
            username: format!("dup{suffix}"),
            email: format!("dup{suffix}@example.com"),
            password_hash: "hash".to_string(),
            role: UserRole::Customer,
        };

        let user = store.create_user(new_user.clone()).await.unwrap();
        let again = store.create_user(new_user).await;
        assert!(matches!(again, Err(MarketError::Conflict(_))));

        store.delete_user(user.id).await.unwrap();
    }
}
