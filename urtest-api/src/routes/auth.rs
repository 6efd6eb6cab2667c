/// Login, logout and registration
///
/// # Endpoints
///
/// - `GET  /login` - login page context
/// - `POST /login` - check credentials, set the session cookie
/// - `GET|POST /logout` - drop the session cookie
/// - `POST /testers/register` - create a tester account
/// - `POST /companies/register/{physical|legal}` - create a customer account
/// - `GET  /me` - redirect to the caller's own profile page
///
/// Successful registration logs the new user in straight away.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{FormBody, LoginForm, RegisterForm},
    middleware::session::{clear_session_cookie, safe_next, session_cookie, with_cookie, LOGIN_PATH},
};
use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use urtest_shared::{
    auth::{
        context::AuthContext,
        jwt::{self, SessionClaims},
        password,
    },
    models::user::{CreateUser, CustomerKind, User},
};

/// Query string of the login page
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Login page context
#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub next: Option<String>,

    /// Already logged-in user, if any
    pub user: Option<AuthContext>,
}

pub async fn login_page(
    viewer: Option<Extension<AuthContext>>,
    Query(query): Query<LoginQuery>,
) -> Json<LoginPage> {
    Json(LoginPage {
        next: safe_next(query.next.as_deref()).map(str::to_string),
        user: viewer.map(|Extension(auth)| auth),
    })
}

/// Issues the session cookie and redirects
fn start_session(state: &AppState, user: &User, redirect_to: &str) -> ApiResult<Response> {
    let claims = SessionClaims::new(user.id, user.role, state.config.session_ttl());
    let token = jwt::create_token(&claims, state.session_secret())?;

    let cookie = session_cookie(
        token,
        state.config.session.ttl_hours,
        state.config.api.production,
    );

    Ok(with_cookie(Redirect::to(redirect_to).into_response(), cookie))
}

/// Checks username and password
///
/// # Errors
///
/// - `401 Unauthorized`: unknown username or wrong password (same message
///   for both)
pub async fn login(
    State(state): State<AppState>,
    FormBody(form): FormBody<LoginForm>,
) -> ApiResult<Response> {
    let invalid = || ApiError::Unauthorized("Invalid username or password".to_string());

    let user = User::find_by_username(&state.db, form.username.trim())
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&form.password, &user.password_hash)? {
        tracing::info!(username = %user.username, "Failed login attempt");
        return Err(invalid());
    }

    User::update_last_login(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    let target = safe_next(form.next.as_deref()).unwrap_or("/me");
    start_session(&state, &user, target)
}

pub async fn logout(State(state): State<AppState>) -> Response {
    with_cookie(
        Redirect::to(LOGIN_PATH).into_response(),
        clear_session_cookie(state.config.api.production),
    )
}

/// Shared registration flow for testers and customers
async fn register(state: &AppState, form: RegisterForm, kind: Option<CustomerKind>) -> ApiResult<Response> {
    let form = form.normalized();
    form.check(kind == Some(CustomerKind::Legal))?;

    if User::username_exists(&state.db, &form.username).await? {
        return Err(ApiError::field(
            "username",
            "User with this username already exists.",
        ));
    }

    let password_hash = password::hash_password(&form.password)?;

    let data = match kind {
        None => CreateUser::tester(&form.username, &form.email, &password_hash, &form.display_name),
        Some(kind) => CreateUser::customer(
            kind,
            &form.username,
            &form.email,
            &password_hash,
            &form.display_name,
            form.organization.clone(),
        ),
    };

    let user = User::create(&state.db, data).await?;
    start_session(state, &user, &user.profile_path())
}

pub async fn register_tester(
    State(state): State<AppState>,
    FormBody(form): FormBody<RegisterForm>,
) -> ApiResult<Response> {
    register(&state, form, None).await
}

/// `kind` is `physical` or `legal`; anything else is a 404
pub async fn register_customer(
    State(state): State<AppState>,
    axum::extract::Path(kind): axum::extract::Path<String>,
    FormBody(form): FormBody<RegisterForm>,
) -> ApiResult<Response> {
    let kind = CustomerKind::from_slug(&kind).ok_or_else(|| ApiError::not_found("Page"))?;
    register(&state, form, Some(kind)).await
}

pub async fn me(Extension(auth): Extension<AuthContext>) -> Redirect {
    let path = if auth.is_tester() {
        format!("/testers/show/{}", auth.user_id)
    } else {
        format!("/companies/show/{}", auth.user_id)
    };
    Redirect::to(&path)
}
