/// Tester and company pages
///
/// # Endpoints
///
/// - `GET /testers/list` - all testers
/// - `GET /testers/show/:id` - tester, enlisted projects, reported bugs
/// - `GET /companies/list` - all customers
/// - `GET /companies/show/:id` - customer and owned projects
///
/// A profile id of the wrong role is a 404.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::IdPath,
};
use axum::{extract::State, Extension, Json};
use serde::Serialize;
use urtest_shared::{
    auth::context::AuthContext,
    models::{
        bug::Bug,
        project::Project,
        user::{User, UserRole},
    },
};

#[derive(Debug, Serialize)]
pub struct UserList {
    pub users: Vec<User>,
    pub user: Option<AuthContext>,
}

#[derive(Debug, Serialize)]
pub struct TesterPage {
    pub tester: User,
    pub projects: Vec<Project>,
    pub bugs: Vec<Bug>,
    pub user: Option<AuthContext>,
}

#[derive(Debug, Serialize)]
pub struct CompanyPage {
    pub company: User,
    pub projects: Vec<Project>,
    pub user: Option<AuthContext>,
}

async fn list_role(
    state: &AppState,
    role: UserRole,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<UserList>> {
    let users = User::list_by_role(&state.db, role).await?;

    Ok(Json(UserList {
        users,
        user: viewer.map(|Extension(auth)| auth),
    }))
}

pub async fn list_testers(
    State(state): State<AppState>,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<UserList>> {
    list_role(&state, UserRole::Tester, viewer).await
}

pub async fn list_companies(
    State(state): State<AppState>,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<UserList>> {
    list_role(&state, UserRole::Customer, viewer).await
}

pub async fn show_tester(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<TesterPage>> {
    let tester = User::find_by_id_and_role(&state.db, id, UserRole::Tester)
        .await?
        .ok_or_else(|| ApiError::not_found("Tester"))?;

    let projects = Project::list_by_tester(&state.db, tester.id).await?;
    let bugs = Bug::list_by_tester(&state.db, tester.id).await?;

    Ok(Json(TesterPage {
        tester,
        projects,
        bugs,
        user: viewer.map(|Extension(auth)| auth),
    }))
}

pub async fn show_company(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<CompanyPage>> {
    let company = User::find_by_id_and_role(&state.db, id, UserRole::Customer)
        .await?
        .ok_or_else(|| ApiError::not_found("Company"))?;

    let projects = Project::list_by_customer(&state.db, company.id).await?;

    Ok(Json(CompanyPage {
        company,
        projects,
        user: viewer.map(|Extension(auth)| auth),
    }))
}
