/// Cookie sessions
///
/// A logged-in browser carries a signed session token in the
/// [`SESSION_COOKIE`] cookie. Two layers work with it:
///
/// - [`session_layer`] runs on every request. A valid token whose user still
///   exists puts an [`AuthContext`] into the request extensions. Anything
///   else (no cookie, bad signature, expired, deleted user) leaves the
///   request anonymous; it is never an error.
/// - [`require_login`] guards individual routes. Anonymous requests are
///   redirected (`303`) to `/login?next=<path>`.
///
/// Handlers then extract `Extension<AuthContext>` on guarded routes or
/// `Option<Extension<AuthContext>>` on public ones.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use cookie::{time::Duration, Cookie, SameSite};
use tracing::debug;
use urtest_shared::{
    auth::{context::AuthContext, jwt},
    models::user::User,
};

use crate::{app::AppState, error::ApiError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "urtest_session";

/// Where anonymous users are sent
pub const LOGIN_PATH: &str = "/login";

/// Builds the `Set-Cookie` cookie carrying a session token
pub fn session_cookie(token: String, ttl_hours: i64, production: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(production);
    cookie.set_max_age(Duration::hours(ttl_hours));
    cookie
}

/// Cookie that makes the browser drop the session
pub fn clear_session_cookie(production: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, "");
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(production);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Attaches a cookie to a response as a `Set-Cookie` header
pub fn with_cookie(mut response: Response, cookie: Cookie<'static>) -> Response {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
            response
        }
        Err(e) => ApiError::InternalError(format!("Invalid cookie header: {}", e)).into_response(),
    }
}

/// Reads the session token from the request's `Cookie` headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE && !cookie.value().is_empty())
        .map(|cookie| cookie.value().to_string())
}

/// `/login?next=<path>`
pub fn login_url(next: &str) -> String {
    match serde_urlencoded::to_string([("next", next)]) {
        Ok(query) => format!("{}?{}", LOGIN_PATH, query),
        Err(_) => LOGIN_PATH.to_string(),
    }
}

/// Accepts only same-site absolute paths as a post-login target
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|path| {
        path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
    })
}

/// Resolves the session cookie into an [`AuthContext`]
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(token) = session_token(req.headers()) {
        match jwt::validate_token(&token, &state.config.session.secret) {
            Ok(claims) => match User::find_by_id(&state.db, claims.sub).await {
                Ok(Some(user)) => {
                    req.extensions_mut().insert(AuthContext::from_user(&user));
                }
                Ok(None) => debug!(user_id = %claims.sub, "Session refers to a deleted user"),
                Err(e) => return ApiError::from(e).into_response(),
            },
            Err(e) => debug!(error = %e, "Ignoring invalid session token"),
        }
    }

    next.run(req).await
}

/// Redirects anonymous requests to the login page
pub async fn require_login(req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthContext>().is_some() {
        return next.run(req).await;
    }

    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    debug!(path, "Anonymous request to a login-only route");
    Redirect::to(&login_url(path)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_url_encodes_next() {
        assert_eq!(login_url("/projects/add"), "/login?next=%2Fprojects%2Fadd");
        assert_eq!(login_url("/bugs/list?x=1&y=2"), "/login?next=%2Fbugs%2Flist%3Fx%3D1%26y%3D2");
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/projects/list")), Some("/projects/list"));
        assert_eq!(safe_next(Some("//evil.example")), None);
        assert_eq!(safe_next(Some("https://evil.example")), None);
        assert_eq!(safe_next(Some("/\\evil.example")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok".to_string(), 2, true).to_string();

        assert!(cookie.starts_with("urtest_session=tok"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=7200"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(false).to_string();

        assert!(cookie.starts_with("urtest_session=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; urtest_session=abc.def.ghi; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc.def.ghi"));

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("urtest_session="));
        assert_eq!(session_token(&empty), None);
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
