/// Attachment storage, download and deletion
///
/// # Endpoints
///
/// - `GET  /files/project/:id` - project file bytes
/// - `POST /files/project/:id/delete` - project owner only
/// - `GET  /files/bug/:id` - bug file bytes
/// - `POST /files/bug/:id/delete` - reporter or project owner
///
/// Uploads themselves arrive through the project and bug pages and land in
/// [`attach_project_file`] / [`attach_bug_file`].
///
/// # Consistency
///
/// The record is inserted inside a transaction, the bytes are written while
/// the transaction is open and the transaction commits last. A failed write
/// rolls the record back; a failed commit removes the written bytes.
/// Deletion removes the record first, then the bytes; bytes that are already
/// gone are only logged.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::UploadForm,
    routes::IdPath,
};
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use urtest_shared::{
    auth::{authorization, context::AuthContext},
    models::{
        attachment::{BugFile, CreateBugFile, CreateProjectFile, ProjectFile},
        bug::Bug,
        project::Project,
    },
    storage::{content_digest, StorageError, StorageKey},
};

/// Records and stores a project attachment
pub(crate) async fn attach_project_file(
    state: &AppState,
    project: &Project,
    upload: UploadForm,
) -> ApiResult<ProjectFile> {
    let mut tx = state.db.begin().await?;

    let record = ProjectFile::insert(
        &mut tx,
        CreateProjectFile {
            project_id: project.id,
            name: upload.filename,
            comment: upload.comment,
            size_bytes: upload.data.len() as i64,
            sha256: content_digest(&upload.data),
        },
    )
    .await?;

    let key = record.storage_key();
    state.store.put(&key, upload.data).await?;
    commit_or_discard(state, tx, &key).await?;

    tracing::info!(
        project_id = %project.id,
        file_id = %record.id,
        size = record.size_bytes,
        "Project file attached"
    );

    Ok(record)
}

/// Records and stores a bug attachment
pub(crate) async fn attach_bug_file(
    state: &AppState,
    bug: &Bug,
    upload: UploadForm,
) -> ApiResult<BugFile> {
    let mut tx = state.db.begin().await?;

    let record = BugFile::insert(
        &mut tx,
        CreateBugFile {
            bug_id: bug.id,
            name: upload.filename,
            comment: upload.comment,
            size_bytes: upload.data.len() as i64,
            sha256: content_digest(&upload.data),
        },
    )
    .await?;

    let key = record.storage_key();
    state.store.put(&key, upload.data).await?;
    commit_or_discard(state, tx, &key).await?;

    tracing::info!(
        bug_id = %bug.id,
        file_id = %record.id,
        size = record.size_bytes,
        "Bug file attached"
    );

    Ok(record)
}

async fn commit_or_discard(
    state: &AppState,
    tx: sqlx::Transaction<'_, sqlx::Postgres>,
    key: &StorageKey,
) -> ApiResult<()> {
    if let Err(e) = tx.commit().await {
        if let Err(cleanup) = state.store.delete(key).await {
            tracing::error!(key = %key, error = %cleanup, "Failed to discard uncommitted file");
        }
        return Err(e.into());
    }
    Ok(())
}

/// `Content-Disposition` value with an ASCII fallback and the exact UTF-8
/// name as `filename*`
fn attachment_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(name, NON_ALPHANUMERIC)
    )
}

async fn serve(state: &AppState, key: &StorageKey, name: &str) -> ApiResult<Response> {
    let data = state.store.get(key).await.map_err(|e| {
        if matches!(e, StorageError::NotFound(_)) {
            tracing::warn!(key = %key, "Attachment record without stored bytes");
        }
        ApiError::from(e)
    })?;

    let content_type = mime_guess::from_path(name).first_or_octet_stream();

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(name)),
        ],
        data,
    )
        .into_response())
}

/// Removes stored bytes after the record is gone; missing bytes are fine
async fn discard(state: &AppState, key: &StorageKey) -> ApiResult<()> {
    if !state.store.delete(key).await? {
        tracing::warn!(key = %key, "Deleted attachment had no stored bytes");
    }
    Ok(())
}

pub async fn download_project_file(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    let file = ProjectFile::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))?;

    serve(&state, &file.storage_key(), &file.name).await
}

pub async fn download_bug_file(
    State(state): State<AppState>,
    IdPath(id): IdPath,
) -> ApiResult<Response> {
    let file = BugFile::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))?;

    serve(&state, &file.storage_key(), &file.name).await
}

/// # Errors
///
/// - `404 Not Found`: no such file
/// - `403 Forbidden`: caller does not own the project
pub async fn delete_project_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Redirect> {
    let file = ProjectFile::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))?;

    let project = Project::find_by_id(&state.db, file.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    authorization::require_project_owner(&auth, &project)?;

    // A concurrent delete may have won; then there is nothing left to do.
    if let Some(deleted) = ProjectFile::delete(&state.db, file.id).await? {
        discard(&state, &deleted.storage_key()).await?;
        tracing::info!(file_id = %deleted.id, project_id = %project.id, "Project file deleted");
    }

    Ok(Redirect::to(&project.path()))
}

/// # Errors
///
/// - `404 Not Found`: no such file
/// - `403 Forbidden`: caller is neither the reporter nor the project owner
pub async fn delete_bug_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    IdPath(id): IdPath,
) -> ApiResult<Redirect> {
    let file = BugFile::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("File"))?;

    let bug = Bug::find_by_id(&state.db, file.bug_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bug"))?;

    let project = Project::find_by_id(&state.db, bug.project_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Project"))?;

    authorization::require_bug_file_access(&auth, &bug, &project)?;

    if let Some(deleted) = BugFile::delete(&state.db, file.id).await? {
        discard(&state, &deleted.storage_key()).await?;
        tracing::info!(file_id = %deleted.id, bug_id = %bug.id, "Bug file deleted");
    }

    Ok(Redirect::to(&bug.path()))
}
