//! Session cookies
//!
//! Both tokens travel as `HttpOnly`, `Path=/`, `SameSite=Lax` cookies. The
//! `Secure` flag is set only in production so local HTTP clients still work.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use super::authority::TokenPair;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

/// Add both token cookies
pub fn with_session(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token.clone(),
        secure,
    ))
    .add(session_cookie(
        REFRESH_TOKEN_COOKIE,
        tokens.refresh_token.clone(),
        secure,
    ))
}

/// Expire both token cookies, whether or not the request carried them
pub fn without_session(jar: CookieJar, secure: bool) -> CookieJar {
    let mut access = session_cookie(ACCESS_TOKEN_COOKIE, String::new(), secure);
    access.make_removal();
    let mut refresh = session_cookie(REFRESH_TOKEN_COOKIE, String::new(), secure);
    refresh.make_removal();

    jar.add(access).add(refresh)
}
