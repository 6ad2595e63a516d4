//! API route definitions
//!
//! Public and protected routes may share a path with different methods; the
//! routers are merged so each method keeps its own guard.

use crate::auth::{auth_middleware, require_roles};
use crate::handlers::{auth, dashboard, products};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use virzufurn_core::UserRole;

const SELLER: &[UserRole] = &[UserRole::Seller];
const CUSTOMER: &[UserRole] = &[UserRole::Customer];

/// Routes mounted at `/api/v1/users`
pub fn user_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler))
        .route("/refresh-token", post(auth::refresh_handler));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout_handler))
        .route("/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let seller_routes = Router::new()
        .route("/seller-dashboard", get(dashboard::seller_dashboard))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_roles(SELLER),
        ));

    let customer_routes = Router::new()
        .route("/customer-dashboard", get(dashboard::customer_dashboard))
        .route_layer(middleware::from_fn_with_state(state, require_roles(CUSTOMER)));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(seller_routes)
        .merge(customer_routes)
}

/// Routes mounted at `/api/v1/products`
pub fn product_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/", get(products::list_products))
        .route("/:productId", get(products::get_product));

    let seller_routes = Router::new()
        .route("/publishProduct", post(products::publish_product))
        .route(
            "/:productId",
            patch(products::update_product).delete(products::delete_product),
        )
        .route(
            "/:productId/displayImage",
            patch(products::update_display_image),
        )
        .route_layer(middleware::from_fn_with_state(state, require_roles(SELLER)));

    Router::new().merge(public_routes).merge(seller_routes)
}
