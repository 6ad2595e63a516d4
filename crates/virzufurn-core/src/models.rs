//! Domain models for the marketplace
//!
//! - User: account record with credentials and the current refresh token
//! - UserRole: closed set of permission classes
//! - Product / Category: catalogue entries published by sellers
//!
//! Wire representations use camelCase keys to match the mobile client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::MarketError;

/// User role enum
///
/// - Customer: browses and buys products
/// - Seller: publishes and manages products
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Seller,
}

impl UserRole {
    /// Convert role to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Seller => "seller",
        }
    }

    /// Dashboard route the client should open after signing in
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            UserRole::Customer => "/api/v1/users/customer-dashboard",
            UserRole::Seller => "/api/v1/users/seller-dashboard",
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(UserRole::Customer),
            "seller" => Ok(UserRole::Seller),
            _ => Err(MarketError::ValidationError(
                "Invalid role. Must be either 'customer' or 'seller'".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account model
///
/// The password hash and the stored refresh token never leave the server:
/// both are skipped during serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    /// Always stored lowercase
    pub username: String,
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: UserRole,
    /// The single refresh token currently accepted for this user
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Build a user record from registration data
    pub fn new(new_user: NewUser) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            full_name: new_user.full_name,
            username: new_user.username.to_lowercase(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            role: new_user.role,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert user to public representation (without sensitive fields)
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            full_name: self.full_name.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data needed to create a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
}

/// Product categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Electronics,
    Clothing,
    Books,
    HomeAndGarden,
    Toys,
    Sports,
    Beauty,
    Automotive,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Electronics,
        Category::Clothing,
        Category::Books,
        Category::HomeAndGarden,
        Category::Toys,
        Category::Sports,
        Category::Beauty,
        Category::Automotive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Books => "books",
            Category::HomeAndGarden => "home_and_garden",
            Category::Toys => "toys",
            Category::Sports => "sports",
            Category::Beauty => "beauty",
            Category::Automotive => "automotive",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| MarketError::ValidationError(format!("Invalid category: {s}")))
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product published by a seller
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub price: f64,
    /// Public URL of the display image
    pub display_image: String,
    /// Public URL of the 3D model preview image
    pub model_image: String,
    pub stock: i32,
    pub category: Category,
    pub seller_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(new_product: NewProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: new_product.name,
            description: new_product.description,
            price: new_product.price,
            display_image: new_product.display_image,
            model_image: new_product.model_image,
            stock: new_product.stock,
            category: new_product.category,
            seller_id: new_product.seller_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: ProductUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(display_image) = update.display_image {
            self.display_image = display_image;
        }
        self.updated_at = Utc::now();
    }
}

/// Data needed to create a product
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub display_image: String,
    pub model_image: String,
    pub stock: i32,
    pub category: Category,
    pub seller_id: Uuid,
}

/// Partial product update
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub category: Option<Category>,
    pub display_image: Option<String>,
}

impl ProductUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
            && self.category.is_none()
            && self.display_image.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User::new(NewUser {
            full_name: "A B".to_string(),
            username: "AB".to_string(),
            email: "a@b.com".to_string(),
            password_hash: "$argon2id$v=19$...".to_string(),
            role: UserRole::Customer,
        })
    }

    #[test]
    fn test_user_role_conversion() {
        assert_eq!(UserRole::Customer.as_str(), "customer");
        assert_eq!(UserRole::Seller.as_str(), "seller");

        assert_eq!("customer".parse::<UserRole>().unwrap(), UserRole::Customer);
        assert_eq!("seller".parse::<UserRole>().unwrap(), UserRole::Seller);
        assert!("admin".parse::<UserRole>().is_err());
        assert!("".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_dashboard_path() {
        assert!(UserRole::Seller.dashboard_path().ends_with("/seller-dashboard"));
        assert!(UserRole::Customer
            .dashboard_path()
            .ends_with("/customer-dashboard"));
    }

    #[test]
    fn test_username_is_lowercased() {
        let user = sample_user();
        assert_eq!(user.username, "ab");
        assert!(user.refresh_token.is_none());
    }

    #[test]
    fn test_sensitive_fields_not_serialized() {
        let mut user = sample_user();
        user.refresh_token = Some("refresh".to_string());

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());
        assert_eq!(json["fullName"], "A B");

        let public = serde_json::to_string(&user.to_public()).unwrap();
        assert!(!public.contains("password"));
    }

    #[test]
    fn test_category_parse_and_display() {
        assert_eq!(
            "home_and_garden".parse::<Category>().unwrap(),
            Category::HomeAndGarden
        );
        assert_eq!(" Books ".parse::<Category>().unwrap(), Category::Books);
        assert!("furniture".parse::<Category>().is_err());

        let json = serde_json::to_string(&Category::HomeAndGarden).unwrap();
        assert_eq!(json, "\"home_and_garden\"");
    }

    #[test]
    fn test_product_apply_update() {
        let mut product = Product::new(NewProduct {
            name: "Chair".to_string(),
            description: "Oak chair".to_string(),
            price: 49.5,
            display_image: "https://cdn/x.png".to_string(),
            model_image: "https://cdn/y.png".to_string(),
            stock: 3,
            category: Category::HomeAndGarden,
            seller_id: Uuid::new_v4(),
        });
        let before = product.updated_at;

        product.apply(ProductUpdate {
            price: Some(39.0),
            stock: Some(10),
            ..Default::default()
        });

        assert_eq!(product.price, 39.0);
        assert_eq!(product.stock, 10);
        assert_eq!(product.name, "Chair");
        assert!(product.updated_at >= before);
        assert!(ProductUpdate::default().is_empty());
    }
}
