//! Product catalogue handlers
//!
//! Listing and lookup are public. Every write requires a seller, and a
//! seller may only modify their own products.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use virzufurn_assets::{upload_and_cleanup, TempFile};
use virzufurn_core::{Category, NewProduct, Product, ProductUpdate};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiResponse, AppError, ErrorEnvelope};
use crate::state::AppState;

const DISPLAY_IMAGE_FIELD: &str = "displayImage";
const MODEL_IMAGE_FIELD: &str = "modelImage";

/// Multipart form accepted by `publishProduct` (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct PublishProductForm {
    name: String,
    description: String,
    price: f64,
    stock: Option<i32>,
    category: Category,
    #[schema(value_type = String, format = Binary)]
    display_image: Vec<u8>,
    #[schema(value_type = String, format = Binary)]
    model_image: Vec<u8>,
}

/// Multipart form accepted by the display image replacement (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
#[serde(rename_all = "camelCase")]
pub struct DisplayImageForm {
    #[schema(value_type = String, format = Binary)]
    display_image: Vec<u8>,
}

/// Partial product update
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListProductsQuery {
    /// Restrict to one category, e.g. `home_and_garden`
    pub category: Option<String>,
}

fn validate_price(price: f64) -> Result<f64, AppError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(AppError::Validation(
            "Price must be a non-negative number".to_string(),
        ))
    }
}

fn validate_stock(stock: i32) -> Result<i32, AppError> {
    if stock >= 0 {
        Ok(stock)
    } else {
        Err(AppError::Validation(
            "Stock must be a non-negative integer".to_string(),
        ))
    }
}

fn parse_price(raw: &str) -> Result<f64, AppError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| AppError::Validation("Price must be a non-negative number".to_string()))
        .and_then(validate_price)
}

fn parse_stock(raw: &str) -> Result<i32, AppError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| AppError::Validation("Stock must be a non-negative integer".to_string()))
        .and_then(validate_stock)
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl UpdateProductRequest {
    fn into_update(self) -> Result<ProductUpdate, AppError> {
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.name) || blank(&self.description) {
            return Err(AppError::Validation(
                "Name and description cannot be empty".to_string(),
            ));
        }

        let update = ProductUpdate {
            name: self.name.map(|v| v.trim().to_string()),
            description: self.description.map(|v| v.trim().to_string()),
            price: self.price.map(validate_price).transpose()?,
            stock: self.stock.map(validate_stock).transpose()?,
            category: self
                .category
                .as_deref()
                .map(str::parse::<Category>)
                .transpose()?,
            display_image: None,
        };

        if update.is_empty() {
            return Err(AppError::Validation("No fields to update".to_string()));
        }
        Ok(update)
    }
}

/// Load a product and check that `user` owns it
async fn owned_product(
    state: &AppState,
    product_id: Uuid,
    user: &AuthenticatedUser,
) -> Result<Product, AppError> {
    let product = state
        .products
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    if product.seller_id != user.user_id {
        tracing::warn!(
            product_id = %product_id,
            user_id = %user.user_id,
            "Seller attempted to modify another seller's product"
        );
        return Err(AppError::Forbidden(
            "You can only modify your own products".to_string(),
        ));
    }
    Ok(product)
}

/// Publish a product with its display and model images
#[utoipa::path(
    post,
    path = "/api/v1/products/publishProduct",
    tag = "products",
    request_body(content = PublishProductForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Product published", body = Product),
        (status = 400, description = "Missing or invalid field", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid access token", body = ErrorEnvelope),
        (status = 403, description = "Not a seller", body = ErrorEnvelope),
        (status = 500, description = "Image upload failed", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn publish_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let temp_dir = &state.config.assets.temp_dir;
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut display_image: Option<TempFile> = None;
    let mut model_image: Option<TempFile> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();

        if name == DISPLAY_IMAGE_FIELD || name == MODEL_IMAGE_FIELD {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let data = field.bytes().await?;
            if data.is_empty() {
                continue;
            }

            let slot = if name == DISPLAY_IMAGE_FIELD {
                &mut display_image
            } else {
                &mut model_image
            };
            if slot.is_some() {
                return Err(AppError::Validation(format!("Only one {name} is allowed")));
            }
            *slot = Some(TempFile::persist(temp_dir, &file_name, &data).await?);
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let (Some(product_name), Some(description), Some(price), Some(category)) = (
        non_blank(fields.get("name")),
        non_blank(fields.get("description")),
        non_blank(fields.get("price")),
        non_blank(fields.get("category")),
    ) else {
        return Err(AppError::Validation("All fields are required".to_string()));
    };

    let price = parse_price(&price)?;
    let stock = match non_blank(fields.get("stock")) {
        Some(raw) => parse_stock(&raw)?,
        None => 0,
    };
    let category: Category = category.parse()?;

    let display_image = display_image
        .ok_or_else(|| AppError::Validation("Display image is required".to_string()))?;
    let model_image =
        model_image.ok_or_else(|| AppError::Validation("Model image is required".to_string()))?;

    let display = upload_and_cleanup(state.uploader.as_ref(), display_image).await?;
    let model = upload_and_cleanup(state.uploader.as_ref(), model_image).await?;

    let product = state
        .products
        .create_product(NewProduct {
            name: product_name,
            description,
            price,
            display_image: display.url,
            model_image: model.url,
            stock,
            category,
            seller_id: user.user_id,
        })
        .await?;

    tracing::info!(
        product_id = %product.id,
        seller_id = %user.user_id,
        category = %product.category,
        "Product published"
    );

    Ok(ApiResponse::created(product, "Product published successfully"))
}

/// List products, newest first
#[utoipa::path(
    get,
    path = "/api/v1/products",
    tag = "products",
    params(ListProductsQuery),
    responses(
        (status = 200, description = "Products", body = [Product]),
        (status = 400, description = "Unknown category", body = ErrorEnvelope),
    )
)]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    WithRejection(Query(query), _): WithRejection<Query<ListProductsQuery>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let category = match non_blank(query.category.as_ref()) {
        Some(raw) => Some(raw.parse::<Category>()?),
        None => None,
    };

    let products = state.products.list_products(category).await?;
    Ok(ApiResponse::ok(products, "Products fetched"))
}

/// Get one product
#[utoipa::path(
    get,
    path = "/api/v1/products/{productId}",
    tag = "products",
    params(("productId" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found", body = ErrorEnvelope),
    )
)]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .products
        .find_product(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(ApiResponse::ok(product, "Product fetched"))
}

/// Update a product owned by the caller
#[utoipa::path(
    patch,
    path = "/api/v1/products/{productId}",
    tag = "products",
    params(("productId" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, description = "Invalid field", body = ErrorEnvelope),
        (status = 403, description = "Not the owner", body = ErrorEnvelope),
        (status = 404, description = "Product not found", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(Json(request), _): WithRejection<Json<UpdateProductRequest>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    let update = request.into_update()?;
    owned_product(&state, product_id, &user).await?;

    let product = state
        .products
        .update_product(product_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    Ok(ApiResponse::ok(product, "Product updated successfully"))
}

/// Replace the display image of a product owned by the caller
#[utoipa::path(
    patch,
    path = "/api/v1/products/{productId}/displayImage",
    tag = "products",
    params(("productId" = Uuid, Path, description = "Product ID")),
    request_body(content = DisplayImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Display image replaced", body = Product),
        (status = 400, description = "Missing image", body = ErrorEnvelope),
        (status = 403, description = "Not the owner", body = ErrorEnvelope),
        (status = 404, description = "Product not found", body = ErrorEnvelope),
        (status = 500, description = "Image upload failed", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_display_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
    WithRejection(mut multipart, _): WithRejection<Multipart, AppError>,
) -> Result<impl IntoResponse, AppError> {
    owned_product(&state, product_id, &user).await?;

    let mut display_image: Option<TempFile> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(DISPLAY_IMAGE_FIELD) {
            continue;
        }
        if display_image.is_some() {
            return Err(AppError::Validation(format!(
                "Only one {DISPLAY_IMAGE_FIELD} is allowed"
            )));
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field.bytes().await?;
        if !data.is_empty() {
            display_image =
                Some(TempFile::persist(&state.config.assets.temp_dir, &file_name, &data).await?);
        }
    }

    let display_image = display_image
        .ok_or_else(|| AppError::Validation("Display image is required".to_string()))?;
    let uploaded = upload_and_cleanup(state.uploader.as_ref(), display_image).await?;

    let product = state
        .products
        .update_product(
            product_id,
            ProductUpdate {
                display_image: Some(uploaded.url),
                ..Default::default()
            },
        )
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    tracing::info!(product_id = %product_id, seller_id = %user.user_id, "Display image replaced");
    Ok(ApiResponse::ok(product, "Display image updated successfully"))
}

/// Delete a product owned by the caller
#[utoipa::path(
    delete,
    path = "/api/v1/products/{productId}",
    tag = "products",
    params(("productId" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted"),
        (status = 403, description = "Not the owner", body = ErrorEnvelope),
        (status = 404, description = "Product not found", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    WithRejection(Path(product_id), _): WithRejection<Path<Uuid>, AppError>,
) -> Result<impl IntoResponse, AppError> {
    owned_product(&state, product_id, &user).await?;

    if !state.products.delete_product(product_id).await? {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    tracing::info!(product_id = %product_id, seller_id = %user.user_id, "Product deleted");
    Ok(ApiResponse::ok(
        serde_json::json!({ "id": product_id }),
        "Product deleted successfully",
    ))
}
