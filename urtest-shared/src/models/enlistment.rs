//! Enlistment of testers in projects
//!
//! Many-to-many relation between testers and projects. Enlisting grants the
//! tester the right to file bugs against the project.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE project_testers (
//!     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
//!     tester_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     enlisted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (project_id, tester_id)
//! );
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::user::User;

/// Enlistment row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Enlistment {
    pub project_id: Uuid,
    pub tester_id: Uuid,
    pub enlisted_at: DateTime<Utc>,
}

impl Enlistment {
    /// Enlists a tester in a project
    ///
    /// Idempotent: enlisting an already enlisted tester leaves the row (and
    /// its original timestamp) untouched.
    ///
    /// # Returns
    ///
    /// True if a new enlistment was created, false if it already existed
    pub async fn enlist(pool: &PgPool, project_id: Uuid, tester_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO project_testers (project_id, tester_id)
            VALUES ($1, $2)
            ON CONFLICT (project_id, tester_id) DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(tester_id)
        .execute(pool)
        .await?;

        let created = result.rows_affected() > 0;
        if created {
            tracing::info!(%project_id, %tester_id, "Tester enlisted");
        } else {
            tracing::debug!(%project_id, %tester_id, "Tester already enlisted");
        }

        Ok(created)
    }

    /// Checks whether a user is enlisted in a project
    pub async fn is_enlisted(pool: &PgPool, project_id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM project_testers WHERE project_id = $1 AND tester_id = $2)",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    /// Testers enlisted in a project, in enlistment order
    pub async fn list_testers(pool: &PgPool, project_id: Uuid) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.username, u.email, u.password_hash, u.display_name, u.role,
                   u.customer_kind, u.organization, u.created_at, u.updated_at, u.last_login_at
            FROM users u
            JOIN project_testers pt ON pt.tester_id = u.id
            WHERE pt.project_id = $1
            ORDER BY pt.enlisted_at
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Number of testers enlisted in a project
    pub async fn count_testers(pool: &PgPool, project_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM project_testers WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(pool)
            .await
    }
}
