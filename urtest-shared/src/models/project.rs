//! Project model and database operations
//!
//! A project belongs to exactly one customer, has a globally unique name and
//! links to programming / documentation languages through the reference
//! tables in [`super::language`]. Testers enlist through
//! [`super::enlistment`].
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE projects (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     name VARCHAR(50) NOT NULL,              -- UNIQUE (projects_name_key)
//!     size BIGINT NOT NULL CHECK (size >= 0), -- lines of code
//!     customer_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     description TEXT NOT NULL DEFAULT '',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::models::project::{CreateProject, Project};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, customer_id: Uuid) -> Result<(), sqlx::Error> {
//! let project = Project::create(&pool, CreateProject {
//!     name: "Foo".to_string(),
//!     size: 12_000,
//!     customer_id,
//!     description: String::new(),
//!     program_language_ids: vec![1],
//!     doc_language_ids: vec![1],
//! }).await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::language::{Language, LanguageKind};

/// Name of the unique constraint on `projects.name`
pub const PROJECT_NAME_CONSTRAINT: &str = "projects_name_key";

/// Project record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,

    /// Globally unique display name
    pub name: String,

    /// Size in source lines of code
    pub size: i64,

    /// Owning customer
    pub customer_id: Uuid,

    pub description: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a project together with its language links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub size: i64,
    pub customer_id: Uuid,
    pub description: String,
    pub program_language_ids: Vec<i32>,
    pub doc_language_ids: Vec<i32>,
}

impl Project {
    /// Canonical detail path
    pub fn path(&self) -> String {
        format!("/projects/{}", self.id)
    }

    /// Creates a project and links its languages in one transaction
    ///
    /// # Errors
    ///
    /// A duplicate name surfaces as a database error on
    /// [`PROJECT_NAME_CONSTRAINT`]; nothing is written in that case.
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, size, customer_id, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, size, customer_id, description, created_at, updated_at
            "#,
        )
        .bind(&data.name)
        .bind(data.size)
        .bind(data.customer_id)
        .bind(&data.description)
        .fetch_one(&mut *tx)
        .await?;

        Language::link_project(&mut tx, LanguageKind::Program, project.id, &data.program_language_ids)
            .await?;
        Language::link_project(&mut tx, LanguageKind::Documentation, project.id, &data.doc_language_ids)
            .await?;

        tx.commit().await?;

        tracing::info!(
            project_id = %project.id,
            customer_id = %project.customer_id,
            name = %project.name,
            "Project created"
        );
        Ok(project)
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, size, customer_id, description, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether a project with this exact name exists
    pub async fn name_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE name = $1)")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    /// Lists all projects, newest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, size, customer_id, description, created_at, updated_at
            FROM projects
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await
    }

    /// Lists projects owned by a customer, newest first
    pub async fn list_by_customer(
        pool: &PgPool,
        customer_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, size, customer_id, description, created_at, updated_at
            FROM projects
            WHERE customer_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(pool)
        .await
    }

    /// Lists projects a tester is enlisted in, most recent enlistment first
    pub async fn list_by_tester(pool: &PgPool, tester_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.name, p.size, p.customer_id, p.description, p.created_at, p.updated_at
            FROM projects p
            JOIN project_testers pt ON pt.project_id = p.id
            WHERE pt.tester_id = $1
            ORDER BY pt.enlisted_at DESC
            "#,
        )
        .bind(tester_id)
        .fetch_all(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_path() {
        let project = Project {
            id: Uuid::new_v4(),
            name: "Foo".to_string(),
            size: 100,
            customer_id: Uuid::new_v4(),
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(project.path(), format!("/projects/{}", project.id));
    }
}
