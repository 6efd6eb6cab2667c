/// Bug routes
///
/// # Endpoints
///
/// - `GET  /bugs/list` - public
/// - `GET  /bugs/:id` - detail; the project's customer also gets the status form
/// - `POST /bugs/:id` - status update, project's customer only
/// - `GET|POST /bugs/:id/add_file` - reporter or project's customer
///
/// Status transitions are unrestricted: any status may follow any other.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{BugStatusForm, FormBody, UploadForm},
    routes::{files, projects::load_project, Choice, IdPath},
};
use axum::{
    extract::{Multipart, State},
    response::Redirect,
    Extension, Json,
};
use serde::Serialize;
use urtest_shared::{
    auth::{authorization, context::AuthContext},
    models::{
        attachment::BugFile,
        bug::{Bug, BugStatus},
        project::Project,
        user::User,
    },
};

async fn load_bug(state: &AppState, id: uuid::Uuid) -> ApiResult<(Bug, Project)> {
    let bug = Bug::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bug"))?;
    let project = load_project(state, bug.project_id).await?;
    Ok((bug, project))
}

#[derive(Debug, Serialize)]
pub struct BugList {
    pub bugs: Vec<Bug>,
    pub user: Option<AuthContext>,
}

pub async fn list_bugs(
    State(state): State<AppState>,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<BugList>> {
    Ok(Json(BugList {
        bugs: Bug::list(&state.db).await?,
        user: viewer.map(|Extension(auth)| auth),
    }))
}

#[derive(Debug, Serialize)]
pub struct BugPage {
    pub bug: Bug,
    pub status_label: &'static str,
    pub project: Project,
    pub reporter: Option<User>,
    pub files: Vec<BugFile>,
    pub user_is_reporter: bool,
    pub can_update_status: bool,

    /// Only present when `can_update_status`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_choices: Option<Vec<Choice>>,

    pub user_can_add_file: bool,
    pub user: AuthContext,
}

pub async fn bug_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Json<BugPage>> {
    let (bug, project) = load_bug(&state, id).await?;

    let can_update_status = authorization::can_update_bug_status(Some(&auth), &project);
    let status_choices = can_update_status.then(|| {
        BugStatus::ALL
            .iter()
            .map(|status| Choice {
                value: status.as_str().to_string(),
                label: status.label(),
            })
            .collect()
    });

    Ok(Json(BugPage {
        status_label: bug.status.label(),
        reporter: User::find_by_id(&state.db, bug.tester_id).await?,
        files: BugFile::list_by_bug(&state.db, bug.id).await?,
        user_is_reporter: bug.tester_id == auth.user_id,
        can_update_status,
        status_choices,
        user_can_add_file: authorization::can_manage_bug_files(Some(&auth), &bug, &project),
        bug,
        project,
        user: auth,
    }))
}

/// Sets status and status comment
///
/// # Errors
///
/// - `403 Forbidden`: caller does not own the bug's project
/// - `422 Unprocessable Entity`: unknown status or comment too long
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
    FormBody(form): FormBody<BugStatusForm>,
) -> ApiResult<Redirect> {
    let (bug, project) = load_bug(&state, id).await?;
    authorization::require_project_owner(&auth, &project)?;

    let (status, comment) = form.clean()?;

    let bug = Bug::update_status(&state.db, bug.id, status, &comment)
        .await?
        .ok_or_else(|| ApiError::not_found("Bug"))?;

    Ok(Redirect::to(&bug.path()))
}

#[derive(Debug, Serialize)]
pub struct AddBugFilePage {
    pub bug: Bug,
    pub project: Project,
}

pub async fn add_file_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Json<AddBugFilePage>> {
    let (bug, project) = load_bug(&state, id).await?;
    authorization::require_bug_file_access(&auth, &bug, &project)?;

    Ok(Json(AddBugFilePage { bug, project }))
}

pub async fn add_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
    multipart: Multipart,
) -> ApiResult<Redirect> {
    let (bug, project) = load_bug(&state, id).await?;
    authorization::require_bug_file_access(&auth, &bug, &project)?;

    let upload = UploadForm::read(multipart).await?;
    files::attach_bug_file(&state, &bug, upload).await?;

    Ok(Redirect::to(&bug.path()))
}
