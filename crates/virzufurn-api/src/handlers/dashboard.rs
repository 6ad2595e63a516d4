//! Role dashboards
//!
//! Both routes sit behind `require_roles`, so reaching the handler means the
//! caller already holds the right role.

use axum::{response::IntoResponse, Extension};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::AuthenticatedUser;
use crate::error::{ApiResponse, ErrorEnvelope};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub message: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/users/seller-dashboard",
    tag = "users",
    responses(
        (status = 200, description = "Seller dashboard", body = DashboardResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorEnvelope),
        (status = 403, description = "Not a seller", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn seller_dashboard(Extension(user): Extension<AuthenticatedUser>) -> impl IntoResponse {
    tracing::debug!(user_id = %user.user_id, "Seller dashboard opened");
    ApiResponse::ok(
        DashboardResponse {
            message: "Welcome to the seller dashboard".to_string(),
        },
        "Seller dashboard",
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/users/customer-dashboard",
    tag = "users",
    responses(
        (status = 200, description = "Customer dashboard", body = DashboardResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorEnvelope),
        (status = 403, description = "Not a customer", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = []))
)]
pub async fn customer_dashboard(
    Extension(user): Extension<AuthenticatedUser>,
) -> impl IntoResponse {
    tracing::debug!(user_id = %user.user_id, "Customer dashboard opened");
    ApiResponse::ok(
        DashboardResponse {
            message: "Welcome to the customer dashboard".to_string(),
        },
        "Customer dashboard",
    )
}
