/// Route handlers, organized by resource
///
/// - `health`: health check
/// - `auth`: login, logout, registration, `/me`
/// - `accounts`: tester and company pages
/// - `projects`: projects, enlistment, bug reports, project files
/// - `bugs`: bug pages, status updates, bug files
/// - `files`: attachment download and delete
///
/// GET handlers return the view context as JSON; successful form posts
/// answer `303 See Other` with the page to show next.

pub mod accounts;
pub mod auth;
pub mod bugs;
pub mod files;
pub mod health;
pub mod projects;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Record id from the `:id` path segment
///
/// Anything that is not a UUID cannot name a record, so it is a 404 like an
/// unknown id.
#[derive(Debug, Clone, Copy)]
pub struct IdPath(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound("Page not found".to_string()))?;

        Uuid::parse_str(&raw)
            .map(IdPath)
            .map_err(|_| ApiError::NotFound("Page not found".to_string()))
    }
}

/// One option of a choice field
#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: &'static str,
}
