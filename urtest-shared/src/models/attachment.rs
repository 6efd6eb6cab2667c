//! File attachments on projects and bugs
//!
//! Only metadata lives in Postgres. The bytes are kept in the
//! [`FileStore`](crate::storage::FileStore) under a key derived from the
//! parent ids and the filename, see [`StorageKey`].
//!
//! Inserts take an open transaction so the caller can write the bytes
//! before committing: a failed write then leaves no orphan record.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE project_files (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
//!     name VARCHAR(255) NOT NULL,
//!     comment TEXT NOT NULL DEFAULT '',
//!     size_bytes BIGINT NOT NULL CHECK (size_bytes >= 0),
//!     sha256 VARCHAR(64) NOT NULL,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     CONSTRAINT project_files_project_name_key UNIQUE (project_id, name)
//! );
//!
//! -- bug_files: same shape keyed by bug_id (bug_files_bug_name_key)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::storage::StorageKey;

/// Unique constraint on (project_id, name)
pub const PROJECT_FILE_NAME_CONSTRAINT: &str = "project_files_project_name_key";

/// Unique constraint on (bug_id, name)
pub const BUG_FILE_NAME_CONSTRAINT: &str = "bug_files_bug_name_key";

/// File attached to a project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectFile {
    pub id: Uuid,
    pub project_id: Uuid,

    /// Sanitized original filename
    pub name: String,

    pub comment: String,
    pub size_bytes: i64,

    /// Hex SHA-256 of the content
    pub sha256: String,

    pub created_at: DateTime<Utc>,
}

/// Input for recording a project attachment
#[derive(Debug, Clone)]
pub struct CreateProjectFile {
    pub project_id: Uuid,
    pub name: String,
    pub comment: String,
    pub size_bytes: i64,
    pub sha256: String,
}

impl ProjectFile {
    /// Key of the stored bytes: `{project_id}_{name}`
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::project_file(self.project_id, &self.name)
    }

    /// Records an attachment inside an open transaction
    ///
    /// # Errors
    ///
    /// A second file with the same name on the same project violates
    /// [`PROJECT_FILE_NAME_CONSTRAINT`].
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        data: CreateProjectFile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, ProjectFile>(
            r#"
            INSERT INTO project_files (project_id, name, comment, size_bytes, sha256)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, project_id, name, comment, size_bytes, sha256, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.name)
        .bind(data.comment)
        .bind(data.size_bytes)
        .bind(data.sha256)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectFile>(
            r#"
            SELECT id, project_id, name, comment, size_bytes, sha256, created_at
            FROM project_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Attachments of a project, oldest first
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectFile>(
            r#"
            SELECT id, project_id, name, comment, size_bytes, sha256, created_at
            FROM project_files
            WHERE project_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes the record, returning it so the caller can remove the bytes
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectFile>(
            r#"
            DELETE FROM project_files
            WHERE id = $1
            RETURNING id, project_id, name, comment, size_bytes, sha256, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

/// File attached to a bug
///
/// `project_id` is not stored on the row; it is joined from the parent bug
/// because the storage key needs it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BugFile {
    pub id: Uuid,
    pub bug_id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub comment: String,
    pub size_bytes: i64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a bug attachment
#[derive(Debug, Clone)]
pub struct CreateBugFile {
    pub bug_id: Uuid,
    pub name: String,
    pub comment: String,
    pub size_bytes: i64,
    pub sha256: String,
}

impl BugFile {
    /// Key of the stored bytes: `{project_id}_{bug_id}_{name}`
    pub fn storage_key(&self) -> StorageKey {
        StorageKey::bug_file(self.project_id, self.bug_id, &self.name)
    }

    /// Records an attachment inside an open transaction
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        data: CreateBugFile,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, BugFile>(
            r#"
            WITH inserted AS (
                INSERT INTO bug_files (bug_id, name, comment, size_bytes, sha256)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, bug_id, name, comment, size_bytes, sha256, created_at
            )
            SELECT i.id, i.bug_id, b.project_id, i.name, i.comment, i.size_bytes,
                   i.sha256, i.created_at
            FROM inserted i
            JOIN bugs b ON b.id = i.bug_id
            "#,
        )
        .bind(data.bug_id)
        .bind(data.name)
        .bind(data.comment)
        .bind(data.size_bytes)
        .bind(data.sha256)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BugFile>(
            r#"
            SELECT f.id, f.bug_id, b.project_id, f.name, f.comment, f.size_bytes,
                   f.sha256, f.created_at
            FROM bug_files f
            JOIN bugs b ON b.id = f.bug_id
            WHERE f.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Attachments of a bug, oldest first
    pub async fn list_by_bug(pool: &PgPool, bug_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BugFile>(
            r#"
            SELECT f.id, f.bug_id, b.project_id, f.name, f.comment, f.size_bytes,
                   f.sha256, f.created_at
            FROM bug_files f
            JOIN bugs b ON b.id = f.bug_id
            WHERE f.bug_id = $1
            ORDER BY f.created_at
            "#,
        )
        .bind(bug_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes the record, returning it so the caller can remove the bytes
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BugFile>(
            r#"
            WITH deleted AS (
                DELETE FROM bug_files
                WHERE id = $1
                RETURNING id, bug_id, name, comment, size_bytes, sha256, created_at
            )
            SELECT d.id, d.bug_id, b.project_id, d.name, d.comment, d.size_bytes,
                   d.sha256, d.created_at
            FROM deleted d
            JOIN bugs b ON b.id = d.bug_id
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
