/// Project routes
///
/// # Endpoints
///
/// Public:
/// - `GET /projects/list`
/// - `GET /projects/:id` - detail with files and the caller's permissions
/// - `GET /projects/:id/testers`
/// - `GET /projects/:id/bugs`
///
/// Login required:
/// - `GET|POST /projects/add` - customers only
/// - `POST /projects/:id/enlist` - testers only, idempotent
/// - `GET|POST /projects/:id/add_bug` - enlisted testers only
/// - `GET|POST /projects/:id/add_file` - the project's customer only

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    forms::{BugForm, FormBody, ProjectForm, UploadForm},
    routes::{files, Choice, IdPath},
};
use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Redirect,
    Extension, Json,
};
use serde::Serialize;
use urtest_shared::{
    auth::{authorization, context::AuthContext},
    models::{
        attachment::ProjectFile,
        bug::{Bug, BugSeverity, CreateBug},
        enlistment::Enlistment,
        language::{Language, LanguageKind},
        project::{CreateProject, Project},
        user::User,
    },
};

pub(crate) async fn load_project(state: &AppState, id: uuid::Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))
}

fn viewer_of(viewer: Option<Extension<AuthContext>>) -> Option<AuthContext> {
    viewer.map(|Extension(auth)| auth)
}

async fn is_enlisted(state: &AppState, viewer: Option<&AuthContext>, project: &Project) -> ApiResult<bool> {
    match viewer {
        Some(auth) if auth.is_tester() => {
            Ok(Enlistment::is_enlisted(&state.db, project.id, auth.user_id).await?)
        }
        _ => Ok(false),
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub projects: Vec<Project>,
    pub user_can_add_project: bool,
    pub user: Option<AuthContext>,
}

pub async fn list_projects(
    State(state): State<AppState>,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<ProjectList>> {
    let user = viewer_of(viewer);
    let projects = Project::list(&state.db).await?;

    Ok(Json(ProjectList {
        projects,
        user_can_add_project: authorization::can_add_project(user.as_ref()),
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProjectPage {
    pub project: Project,
    pub customer: Option<User>,
    pub program_languages: Vec<Language>,
    pub doc_languages: Vec<Language>,
    pub files: Vec<ProjectFile>,
    pub tester_count: i64,
    pub user_can_enlist: bool,
    pub user_can_add_file: bool,
    pub user_can_add_bug: bool,
    pub user: Option<AuthContext>,
}

pub async fn project_detail(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<ProjectPage>> {
    let user = viewer_of(viewer);
    let project = load_project(&state, id).await?;

    let enlisted = is_enlisted(&state, user.as_ref(), &project).await?;

    Ok(Json(ProjectPage {
        customer: User::find_by_id(&state.db, project.customer_id).await?,
        program_languages: Language::list_for_project(&state.db, LanguageKind::Program, project.id)
            .await?,
        doc_languages: Language::list_for_project(&state.db, LanguageKind::Documentation, project.id)
            .await?,
        files: ProjectFile::list_by_project(&state.db, project.id).await?,
        tester_count: Enlistment::count_testers(&state.db, project.id).await?,
        user_can_enlist: authorization::can_enlist(user.as_ref(), enlisted),
        user_can_add_file: authorization::can_manage_project_files(user.as_ref(), &project),
        user_can_add_bug: authorization::can_add_bug(user.as_ref(), enlisted),
        project,
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProjectTestersPage {
    pub project: Project,
    pub testers: Vec<User>,
    pub user_can_enlist: bool,
    pub user: Option<AuthContext>,
}

pub async fn project_testers(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<ProjectTestersPage>> {
    let user = viewer_of(viewer);
    let project = load_project(&state, id).await?;
    let testers = Enlistment::list_testers(&state.db, project.id).await?;

    let enlisted = user
        .as_ref()
        .is_some_and(|auth| testers.iter().any(|t| t.id == auth.user_id));

    Ok(Json(ProjectTestersPage {
        user_can_enlist: authorization::can_enlist(user.as_ref(), enlisted),
        project,
        testers,
        user,
    }))
}

#[derive(Debug, Serialize)]
pub struct ProjectBugsPage {
    pub project: Project,
    pub bugs: Vec<Bug>,
    pub user_can_add_bug: bool,
    pub user: Option<AuthContext>,
}

pub async fn project_bugs(
    State(state): State<AppState>,
    IdPath(id): IdPath,
    viewer: Option<Extension<AuthContext>>,
) -> ApiResult<Json<ProjectBugsPage>> {
    let user = viewer_of(viewer);
    let project = load_project(&state, id).await?;
    let enlisted = is_enlisted(&state, user.as_ref(), &project).await?;

    Ok(Json(ProjectBugsPage {
        bugs: Bug::list_by_project(&state.db, project.id).await?,
        user_can_add_bug: authorization::can_add_bug(user.as_ref(), enlisted),
        project,
        user,
    }))
}

/// Adds the caller to the project's testers
///
/// # Errors
///
/// - `403 Forbidden`: caller is not a tester; nothing changes
/// - `404 Not Found`: no such project
pub async fn enlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Redirect> {
    let project = load_project(&state, id).await?;
    authorization::require_tester(&auth)?;

    if !Enlistment::enlist(&state.db, project.id, auth.user_id).await? {
        tracing::debug!(project_id = %project.id, tester_id = %auth.user_id, "Already enlisted");
    }

    Ok(Redirect::to(&format!("{}/testers", project.path())))
}

#[derive(Debug, Serialize)]
pub struct AddProjectPage {
    pub program_languages: Vec<Language>,
    pub doc_languages: Vec<Language>,
}

pub async fn add_project_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<AddProjectPage>> {
    authorization::require_customer(&auth)?;

    Ok(Json(AddProjectPage {
        program_languages: Language::list(&state.db, LanguageKind::Program).await?,
        doc_languages: Language::list(&state.db, LanguageKind::Documentation).await?,
    }))
}

fn unknown_choices(field: &str, ids: &[i32]) -> Option<ValidationErrorDetail> {
    let first = ids.first()?;
    Some(ValidationErrorDetail {
        field: field.to_string(),
        message: format!(
            "Select a valid choice. {} is not one of the available choices.",
            first
        ),
    })
}

/// Creates a project owned by the caller
///
/// The body is read raw because language checkboxes repeat their key.
///
/// # Errors
///
/// - `403 Forbidden`: caller is not a customer
/// - `422 Unprocessable Entity`: field errors, including a taken name and
///   unknown language ids; nothing is persisted
pub async fn add_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    body: Bytes,
) -> ApiResult<Redirect> {
    authorization::require_customer(&auth)?;

    let new = ProjectForm::parse(&body)?.clean()?;

    let mut details = Vec::new();
    if Project::name_exists(&state.db, &new.name).await? {
        details.push(ValidationErrorDetail {
            field: "name".to_string(),
            message: "Project with this name already exists.".to_string(),
        });
    }

    let unknown = Language::find_unknown(&state.db, LanguageKind::Program, &new.program_languages).await?;
    details.extend(unknown_choices("program_languages", &unknown));

    let unknown = Language::find_unknown(&state.db, LanguageKind::Documentation, &new.doc_languages).await?;
    details.extend(unknown_choices("doc_languages", &unknown));

    if !details.is_empty() {
        return Err(ApiError::ValidationError(details));
    }

    let project = Project::create(
        &state.db,
        CreateProject {
            name: new.name,
            size: new.size,
            customer_id: auth.user_id,
            description: new.description,
            program_language_ids: new.program_languages,
            doc_language_ids: new.doc_languages,
        },
    )
    .await?;

    Ok(Redirect::to(&project.path()))
}

#[derive(Debug, Serialize)]
pub struct AddBugPage {
    pub project: Project,
    pub severities: Vec<Choice>,
    pub default_severity: i16,
}

pub async fn add_bug_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Json<AddBugPage>> {
    let project = load_project(&state, id).await?;
    authorization::require_enlisted(&state.db, &auth, project.id).await?;

    Ok(Json(AddBugPage {
        project,
        severities: BugSeverity::ALL
            .iter()
            .map(|severity| Choice {
                value: severity.level().to_string(),
                label: severity.label(),
            })
            .collect(),
        default_severity: BugSeverity::default().level(),
    }))
}

/// Files a bug against the project
///
/// # Errors
///
/// - `403 Forbidden`: caller is not a tester enlisted in the project
/// - `422 Unprocessable Entity`: field errors
pub async fn add_bug(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
    FormBody(form): FormBody<BugForm>,
) -> ApiResult<Redirect> {
    let project = load_project(&state, id).await?;
    authorization::require_enlisted(&state.db, &auth, project.id).await?;

    let (form, severity) = form.clean()?;

    let bug = Bug::create(
        &state.db,
        CreateBug {
            project_id: project.id,
            tester_id: auth.user_id,
            short_description: form.short_description,
            finding_description: form.finding_description,
            full_description: form.full_description,
            severity,
        },
    )
    .await?;

    Ok(Redirect::to(&bug.path()))
}

#[derive(Debug, Serialize)]
pub struct AddProjectFilePage {
    pub project: Project,
}

pub async fn add_file_page(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Json<AddProjectFilePage>> {
    let project = load_project(&state, id).await?;
    authorization::require_project_owner(&auth, &project)?;

    Ok(Json(AddProjectFilePage { project }))
}

/// Attaches an uploaded file to the project
///
/// # Errors
///
/// - `403 Forbidden`: caller does not own the project
/// - `422 Unprocessable Entity`: no file, empty file, unusable or duplicate
///   filename
pub async fn add_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
    multipart: Multipart,
) -> ApiResult<Redirect> {
    let project = load_project(&state, id).await?;
    authorization::require_project_owner(&auth, &project)?;

    let upload = UploadForm::read(multipart).await?;
    files::attach_project_file(&state, &project, upload).await?;

    Ok(Redirect::to(&project.path()))
}
