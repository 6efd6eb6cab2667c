/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use urtest_api::{app::{build_router, AppState}, config::Config};
/// use urtest_shared::storage::DiskStore;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let store = DiskStore::open(&config.storage.upload_dir).await?;
///
/// let app = build_router(AppState::new(pool, config, Arc::new(store)));
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{
        security::SecurityHeadersLayer,
        session::{require_login, session_layer},
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use urtest_shared::storage::FileStore;

/// Shared application state, cloned into every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Attachment bytes
    pub store: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config, store: Arc<dyn FileStore>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            store,
        }
    }

    pub fn session_secret(&self) -> &str {
        &self.config.session.secret
    }
}

/// Builds the complete router
///
/// ```text
/// public                              login required
/// ------                              --------------
/// GET  /health                        GET       /me
/// GET  /login, POST /login            GET|POST  /projects/add
/// GET|POST /logout                    POST      /projects/:id/enlist
/// POST /testers/register              GET|POST  /projects/:id/add_bug
/// POST /companies/register/:kind      GET|POST  /projects/:id/add_file
/// GET  /testers/list                  GET|POST  /bugs/:id
/// GET  /testers/show/:id              GET|POST  /bugs/:id/add_file
/// GET  /companies/list                GET       /files/project/:id
/// GET  /companies/show/:id            POST      /files/project/:id/delete
/// GET  /projects/list                 GET       /files/bug/:id
/// GET  /projects/:id                  POST      /files/bug/:id/delete
/// GET  /projects/:id/testers
/// GET  /projects/:id/bugs
/// GET  /bugs/list
/// ```
///
/// Middleware, outermost first: security headers, CORS, compression,
/// request tracing, body limit, session resolution; the login guard wraps
/// only the right-hand routes.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{accounts, auth, bugs, files, health, projects};

    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", get(auth::logout).post(auth::logout))
        .route("/testers/register", post(auth::register_tester))
        .route("/companies/register/:kind", post(auth::register_customer))
        .route("/testers/list", get(accounts::list_testers))
        .route("/testers/show/:id", get(accounts::show_tester))
        .route("/companies/list", get(accounts::list_companies))
        .route("/companies/show/:id", get(accounts::show_company))
        .route("/projects/list", get(projects::list_projects))
        .route("/projects/:id", get(projects::project_detail))
        .route("/projects/:id/testers", get(projects::project_testers))
        .route("/projects/:id/bugs", get(projects::project_bugs))
        .route("/bugs/list", get(bugs::list_bugs));

    let member_routes = Router::new()
        .route("/me", get(auth::me))
        .route(
            "/projects/add",
            get(projects::add_project_page).post(projects::add_project),
        )
        .route("/projects/:id/enlist", post(projects::enlist))
        .route(
            "/projects/:id/add_bug",
            get(projects::add_bug_page).post(projects::add_bug),
        )
        .route(
            "/projects/:id/add_file",
            get(projects::add_file_page).post(projects::add_file),
        )
        .route("/bugs/:id", get(bugs::bug_detail).post(bugs::update_status))
        .route(
            "/bugs/:id/add_file",
            get(bugs::add_file_page).post(bugs::add_file),
        )
        .route("/files/project/:id", get(files::download_project_file))
        .route("/files/project/:id/delete", post(files::delete_project_file))
        .route("/files/bug/:id", get(files::download_bug_file))
        .route("/files/bug/:id/delete", post(files::delete_bug_file))
        .route_layer(axum::middleware::from_fn(require_login));

    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .fallback(|| async { ApiError::NotFound("Page not found".to_string()) })
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_layer,
        ))
        .layer(DefaultBodyLimit::max(state.config.storage.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
