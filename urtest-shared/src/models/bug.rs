//! Bug model and database operations
//!
//! Bugs are filed by an enlisted tester against a project. The project's
//! customer resolves them by setting a status and an optional comment.
//! Status transitions are unconstrained: any status may follow any other.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE bug_status AS ENUM (
//!     'new', 'confirmed', 'in_progress', 'fixed', 'rejected', 'closed'
//! );
//!
//! CREATE TABLE bugs (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
//!     tester_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
//!     short_description VARCHAR(100) NOT NULL,
//!     finding_description VARCHAR(600) NOT NULL,
//!     full_description VARCHAR(600) NOT NULL,
//!     severity SMALLINT NOT NULL DEFAULT 2 CHECK (severity BETWEEN 1 AND 4),
//!     status bug_status NOT NULL DEFAULT 'new',
//!     status_comment VARCHAR(100) NOT NULL DEFAULT '',
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::models::bug::{Bug, BugSeverity, BugStatus, CreateBug};
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! # async fn example(pool: PgPool, project_id: Uuid, tester_id: Uuid) -> Result<(), sqlx::Error> {
//! let bug = Bug::create(&pool, CreateBug {
//!     project_id,
//!     tester_id,
//!     short_description: "Crash on save".to_string(),
//!     finding_description: "Click save twice".to_string(),
//!     full_description: "The editor panics".to_string(),
//!     severity: BugSeverity::default(),
//! }).await?;
//!
//! Bug::update_status(&pool, bug.id, BugStatus::Closed, "Fixed in 1.2").await?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Bug severity, stored as its numeric level
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum BugSeverity {
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl BugSeverity {
    /// Every level, in ascending order
    pub const ALL: [BugSeverity; 4] = [
        BugSeverity::Low,
        BugSeverity::Medium,
        BugSeverity::High,
        BugSeverity::Critical,
    ];

    /// Numeric level as submitted by the bug form
    pub fn level(&self) -> i16 {
        *self as i16
    }

    pub fn from_level(level: i16) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.level() == level)
    }

    pub fn label(&self) -> &'static str {
        match self {
            BugSeverity::Low => "Low",
            BugSeverity::Medium => "Medium",
            BugSeverity::High => "High",
            BugSeverity::Critical => "Critical",
        }
    }
}

/// Resolution state of a bug
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "bug_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BugStatus {
    #[default]
    New,
    Confirmed,
    InProgress,
    Fixed,
    Rejected,
    Closed,
}

impl BugStatus {
    pub const ALL: [BugStatus; 6] = [
        BugStatus::New,
        BugStatus::Confirmed,
        BugStatus::InProgress,
        BugStatus::Fixed,
        BugStatus::Rejected,
        BugStatus::Closed,
    ];

    /// Form / database value
    pub fn as_str(&self) -> &'static str {
        match self {
            BugStatus::New => "new",
            BugStatus::Confirmed => "confirmed",
            BugStatus::InProgress => "in_progress",
            BugStatus::Fixed => "fixed",
            BugStatus::Rejected => "rejected",
            BugStatus::Closed => "closed",
        }
    }

    /// Parses a submitted value, accepting the label as well ("Closed")
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.as_str() == value || s.label().eq_ignore_ascii_case(value))
    }

    pub fn label(&self) -> &'static str {
        match self {
            BugStatus::New => "New",
            BugStatus::Confirmed => "Confirmed",
            BugStatus::InProgress => "In progress",
            BugStatus::Fixed => "Fixed",
            BugStatus::Rejected => "Rejected",
            BugStatus::Closed => "Closed",
        }
    }
}

/// Bug record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bug {
    pub id: Uuid,
    pub project_id: Uuid,

    /// Reporting tester
    pub tester_id: Uuid,

    pub short_description: String,

    /// How the bug was found (steps to reproduce)
    pub finding_description: String,

    pub full_description: String,
    pub severity: BugSeverity,
    pub status: BugStatus,

    /// Customer's note attached to the latest status change
    pub status_comment: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for filing a bug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBug {
    pub project_id: Uuid,
    pub tester_id: Uuid,
    pub short_description: String,
    pub finding_description: String,
    pub full_description: String,
    pub severity: BugSeverity,
}

const BUG_COLUMNS: &str = "id, project_id, tester_id, short_description, finding_description, \
     full_description, severity, status, status_comment, created_at, updated_at";

impl Bug {
    /// Canonical detail path
    pub fn path(&self) -> String {
        format!("/bugs/{}", self.id)
    }

    /// Files a new bug with status `new`
    pub async fn create(pool: &PgPool, data: CreateBug) -> Result<Self, sqlx::Error> {
        let bug = sqlx::query_as::<_, Bug>(&format!(
            r#"
            INSERT INTO bugs (project_id, tester_id, short_description, finding_description,
                              full_description, severity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {BUG_COLUMNS}
            "#
        ))
        .bind(data.project_id)
        .bind(data.tester_id)
        .bind(data.short_description)
        .bind(data.finding_description)
        .bind(data.full_description)
        .bind(data.severity)
        .fetch_one(pool)
        .await?;

        tracing::info!(
            bug_id = %bug.id,
            project_id = %bug.project_id,
            tester_id = %bug.tester_id,
            severity = bug.severity.level(),
            "Bug filed"
        );
        Ok(bug)
    }

    /// Finds a bug by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bug>(&format!("SELECT {BUG_COLUMNS} FROM bugs WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lists every bug, newest first
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bug>(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs ORDER BY created_at DESC"
        ))
        .fetch_all(pool)
        .await
    }

    /// Lists bugs of a project, newest first
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bug>(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs WHERE project_id = $1 ORDER BY created_at DESC"
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Lists bugs reported by a tester, newest first
    pub async fn list_by_tester(pool: &PgPool, tester_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Bug>(&format!(
            "SELECT {BUG_COLUMNS} FROM bugs WHERE tester_id = $1 ORDER BY created_at DESC"
        ))
        .bind(tester_id)
        .fetch_all(pool)
        .await
    }

    /// Sets status and status comment
    ///
    /// # Returns
    ///
    /// The updated bug, None if it does not exist
    pub async fn update_status(
        pool: &PgPool,
        id: Uuid,
        status: BugStatus,
        status_comment: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let bug = sqlx::query_as::<_, Bug>(&format!(
            r#"
            UPDATE bugs
            SET status = $2, status_comment = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {BUG_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status)
        .bind(status_comment)
        .fetch_optional(pool)
        .await?;

        if let Some(ref bug) = bug {
            tracing::info!(bug_id = %bug.id, status = bug.status.as_str(), "Bug status updated");
        }

        Ok(bug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severity_is_level_two() {
        assert_eq!(BugSeverity::default().level(), 2);
    }

    #[test]
    fn test_severity_from_level() {
        assert_eq!(BugSeverity::from_level(1), Some(BugSeverity::Low));
        assert_eq!(BugSeverity::from_level(4), Some(BugSeverity::Critical));
        assert_eq!(BugSeverity::from_level(0), None);
        assert_eq!(BugSeverity::from_level(5), None);
    }

    #[test]
    fn test_status_parse_accepts_value_and_label() {
        assert_eq!(BugStatus::parse("closed"), Some(BugStatus::Closed));
        assert_eq!(BugStatus::parse("Closed"), Some(BugStatus::Closed));
        assert_eq!(BugStatus::parse("in_progress"), Some(BugStatus::InProgress));
        assert_eq!(BugStatus::parse("In progress"), Some(BugStatus::InProgress));
        assert_eq!(BugStatus::parse("reopened"), None);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BugStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn test_every_status_round_trips_through_as_str() {
        for status in BugStatus::ALL {
            assert_eq!(BugStatus::parse(status.as_str()), Some(status));
        }
    }
}
