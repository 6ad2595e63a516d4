//! Virzufurn API - REST server
//!
//! Provides the HTTP surface of the marketplace: account management with
//! JWT access/refresh tokens, role dashboards and the product catalogue.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{metrics_middleware, security_headers_middleware};
use crate::state::AppState;

/// OpenAPI document served at `/api-docs/openapi.json`
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Virzufurn API",
        description = "Marketplace backend with JWT sessions and role-based access"
    ),
    paths(
        handlers::health::health_check,
        handlers::auth::register_handler,
        handlers::auth::login_handler,
        handlers::auth::logout_handler,
        handlers::auth::refresh_handler,
        handlers::auth::me_handler,
        handlers::dashboard::seller_dashboard,
        handlers::dashboard::customer_dashboard,
        handlers::products::publish_product,
        handlers::products::list_products,
        handlers::products::get_product,
        handlers::products::update_product,
        handlers::products::update_display_image,
        handlers::products::delete_product,
    ),
    components(schemas(
        error::ErrorEnvelope,
        handlers::health::HealthResponse,
        handlers::auth::RefreshRequest,
        handlers::dashboard::DashboardResponse,
        handlers::products::PublishProductForm,
        handlers::products::UpdateProductRequest,
        handlers::products::DisplayImageForm,
        auth::RegisterRequest,
        auth::LoginRequest,
        auth::AuthResponse,
        auth::TokenPair,
        virzufurn_core::UserPublic,
        virzufurn_core::UserRole,
        virzufurn_core::Product,
        virzufurn_core::Category,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Service health"),
        (name = "users", description = "Accounts, sessions and dashboards"),
        (name = "products", description = "Product catalogue"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// CORS policy from `server.cors_origins`
///
/// With no origins configured any origin is allowed, without credentials.
/// Listed origins may send cookies.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Path component of `assets.base_url`, e.g. `/uploads`
///
/// `None` when the URL has no path, since a service cannot be nested at `/`.
fn uploads_mount(base_url: &str) -> Option<String> {
    let rest = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    let path = &rest[rest.find('/')?..];
    let path = path.trim_end_matches('/');

    (!path.is_empty()).then(|| path.to_string())
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let cors = cors_layer(&state.config.server.cors_origins);

    let mut router = Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v1/users", routes::user_routes(state.clone()))
        .nest("/api/v1/products", routes::product_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // Without Cloudinary, uploads land in public_dir and are served from here
    let assets = &state.config.assets;
    if assets.cloudinary_credentials().is_none() {
        match uploads_mount(&assets.base_url) {
            Some(mount) => {
                tracing::info!(
                    mount = %mount,
                    dir = %assets.public_dir.display(),
                    "Serving local uploads"
                );
                router = router.nest_service(&mount, ServeDir::new(&assets.public_dir));
            }
            None => tracing::warn!(
                base_url = %assets.base_url,
                "Asset base URL has no path; local uploads are not served"
            ),
        }
    }

    router
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            security_headers_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        assert!(paths.contains_key("/api/v1/users/register"));
        assert!(paths.contains_key("/api/v1/users/refresh-token"));
        assert!(paths.contains_key("/api/v1/products/publishProduct"));
        assert!(paths.contains_key("/api/v1/products/{productId}"));
        assert!(paths.contains_key("/api/v1/products/{productId}/displayImage"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }

    #[test]
    fn test_uploads_mount() {
        assert_eq!(
            uploads_mount("http://localhost:8000/uploads"),
            Some("/uploads".to_string())
        );
        assert_eq!(
            uploads_mount("https://cdn.test/static/img/"),
            Some("/static/img".to_string())
        );
        assert_eq!(uploads_mount("/files"), Some("/files".to_string()));
        assert_eq!(uploads_mount("http://localhost:8000"), None);
        assert_eq!(uploads_mount("http://localhost:8000/"), None);
    }

    #[test]
    fn test_cors_layer_skips_invalid_origin() {
        // Construction must not panic on a bad origin
        let _ = cors_layer(&["http://ok.test".to_string(), "bad\norigin".to_string()]);
        let _ = cors_layer(&[]);
    }
}
