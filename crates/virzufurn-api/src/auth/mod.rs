//! Authentication and authorization
//!
//! - `jwt`: token encoding and validation
//! - `password`: Argon2id hashing
//! - `authority`: token issuance, rotation, revocation and the role gate
//! - `middleware`: axum layers that run the gate on each request
//! - `service`: registration, login and logout
//! - `cookies`: session cookie helpers

pub mod authority;
pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use authority::{TokenAuthority, TokenPair};
pub use jwt::{Claims, JwtConfig, JwtError, TokenKind};
pub use middleware::{auth_middleware, require_roles, AuthError, AuthenticatedUser};
pub use password::{PasswordConfig, PasswordError};
pub use service::{AccountService, AuthResponse, LoginRequest, RegisterRequest};
