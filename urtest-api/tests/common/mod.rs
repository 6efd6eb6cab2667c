/// Common test utilities for integration tests
///
/// - Database connection with migrations applied (`DATABASE_URL`)
/// - Upload directory in a temporary folder
/// - Account registration through the real routes, returning the session
///   cookie
/// - Request helpers for forms, multipart uploads and JSON pages

use axum::body::{Body, Bytes};
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::Service as _;
use urtest_api::app::{build_router, AppState};
use urtest_api::config::Config;
use urtest_shared::db::migrations::run_migrations;
use urtest_shared::models::language::{Language, LanguageKind};
use urtest_shared::models::user::User;
use urtest_shared::storage::DiskStore;
use uuid::Uuid;

const TEST_SESSION_SECRET: &str = "integration-test-session-secret-0123456789";

pub const PASSWORD: &str = "Sup3r$ecret";

const BOUNDARY: &str = "urtest-test-boundary";

/// Logged-in account
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,

    /// `urtest_session=...` pair for the `Cookie` header
    pub cookie: String,
}

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    pub config: Config,
    pub store: Arc<DiskStore>,
    _upload_dir: TempDir,
    users: Mutex<Vec<Uuid>>,
}

impl TestContext {
    pub async fn new() -> anyhow::Result<Self> {
        let upload_dir = tempfile::tempdir()?;
        let upload_path = upload_dir.path().to_string_lossy().into_owned();

        dotenvy::dotenv().ok();
        let config = Config::from_lookup(|key| match key {
            "UPLOAD_DIR" => Some(upload_path.clone()),
            "SESSION_SECRET" => std::env::var(key)
                .ok()
                .or_else(|| Some(TEST_SESSION_SECRET.to_string())),
            _ => std::env::var(key).ok(),
        })?;

        let db = PgPool::connect(&config.database.url).await?;
        run_migrations(&db).await?;

        let store = Arc::new(DiskStore::open(upload_dir.path()).await?);
        let state = AppState::new(db.clone(), config.clone(), store.clone());
        let app = build_router(state);

        Ok(TestContext {
            db,
            app,
            config,
            store,
            _upload_dir: upload_dir,
            users: Mutex::new(Vec::new()),
        })
    }

    /// Sends a request through the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().call(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, session: Option<&Session>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, &session.cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// GET returning status and JSON body
    pub async fn get_json(&self, uri: &str, session: Option<&Session>) -> (StatusCode, Value) {
        let response = self.get(uri, session).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn post_form(
        &self,
        uri: &str,
        session: Option<&Session>,
        fields: &[(&str, &str)],
    ) -> Response<Body> {
        let body = serde_urlencoded::to_string(fields).unwrap();

        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(session) = session {
            builder = builder.header(header::COOKIE, &session.cookie);
        }
        self.send(builder.body(Body::from(body)).unwrap()).await
    }

    /// Multipart POST with a `file` part and a `comment` part
    pub async fn upload(
        &self,
        uri: &str,
        session: &Session,
        filename: &str,
        data: &[u8],
        comment: &str,
    ) -> Response<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"comment\"\r\n\r\n{comment}\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header(header::COOKIE, &session.cookie)
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    async fn register(&self, uri: &str, prefix: &str, organization: Option<&str>) -> Session {
        let username = unique_name(prefix);
        let email = format!("{}@example.com", username);

        let mut fields = vec![
            ("username", username.as_str()),
            ("email", email.as_str()),
            ("password", PASSWORD),
            ("display_name", "Test Person"),
        ];
        if let Some(organization) = organization {
            fields.push(("organization", organization));
        }

        let response = self.post_form(uri, None, &fields).await;
        if response.status() != StatusCode::SEE_OTHER {
            let status = response.status();
            panic!("registration failed with {}: {}", status, body_json(response).await);
        }

        let cookie = session_cookie(&response).expect("registration sets a session cookie");
        let user_id = location(&response)
            .rsplit('/')
            .next()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("registration redirects to the profile page");

        self.users.lock().unwrap().push(user_id);

        Session {
            user_id,
            username,
            cookie,
        }
    }

    pub async fn register_tester(&self) -> Session {
        self.register("/testers/register", "tester", None).await
    }

    pub async fn register_customer(&self) -> Session {
        self.register("/companies/register/physical", "customer", None).await
    }

    /// First seeded language of each kind
    pub async fn language_ids(&self) -> (i32, i32) {
        let program = Language::list(&self.db, LanguageKind::Program).await.unwrap();
        let doc = Language::list(&self.db, LanguageKind::Documentation)
            .await
            .unwrap();
        (program[0].id, doc[0].id)
    }

    /// Creates a project through the form route and returns its id
    pub async fn create_project(&self, customer: &Session, name: &str) -> Uuid {
        let (program, doc) = self.language_ids().await;
        let program = program.to_string();
        let doc = doc.to_string();

        let response = self
            .post_form(
                "/projects/add",
                Some(customer),
                &[
                    ("name", name),
                    ("size", "1000"),
                    ("program_languages", program.as_str()),
                    ("doc_languages", doc.as_str()),
                    ("description", "Test project"),
                ],
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        id_from_location(&response)
    }

    /// Deletes every account registered through this context; projects, bugs
    /// and file records cascade
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        let users: Vec<Uuid> = self.users.lock().unwrap().drain(..).collect();
        for id in users {
            User::delete(&self.db, id).await?;
        }
        Ok(())
    }
}

/// Username / project name that does not collide between test runs
pub fn unique_name(prefix: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &suffix[..12])
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = body_bytes(response).await;
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// Id in the redirect target, e.g. `/projects/{id}` or `/bugs/{id}`
pub fn id_from_location(response: &Response<Body>) -> Uuid {
    let location = location(response);
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|id| Uuid::parse_str(id).ok())
        .unwrap_or_else(|| panic!("no id in redirect target {:?}", location))
}

/// `name=value` of the session cookie set by a response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter(|value| value.starts_with("urtest_session="))
        .filter_map(|value| value.split(';').next())
        .map(str::to_string)
        .next()
}
