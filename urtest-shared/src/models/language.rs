//! Language reference tables
//!
//! Projects pick one or more programming languages and one or more
//! documentation languages from two seeded reference tables. Both tables
//! have the same shape, so a single [`Language`] record and a
//! [`LanguageKind`] selector cover them.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Which reference table a language id belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageKind {
    /// `program_languages`
    Program,

    /// `doc_languages`
    Documentation,
}

impl LanguageKind {
    fn table(&self) -> &'static str {
        match self {
            LanguageKind::Program => "program_languages",
            LanguageKind::Documentation => "doc_languages",
        }
    }

    fn link_table(&self) -> &'static str {
        match self {
            LanguageKind::Program => "project_program_languages",
            LanguageKind::Documentation => "project_doc_languages",
        }
    }
}

/// Reference row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Language {
    pub id: i32,
    pub name: String,
}

impl Language {
    /// Lists every choice of the given kind, alphabetically
    pub async fn list(pool: &PgPool, kind: LanguageKind) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Language>(&format!(
            "SELECT id, name FROM {} ORDER BY name",
            kind.table()
        ))
        .fetch_all(pool)
        .await
    }

    /// Returns the subset of `ids` that do not exist in the reference table
    pub async fn find_unknown(
        pool: &PgPool,
        kind: LanguageKind,
        ids: &[i32],
    ) -> Result<Vec<i32>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let known: Vec<i32> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE id = ANY($1)",
            kind.table()
        ))
        .bind(ids)
        .fetch_all(pool)
        .await?;

        Ok(ids.iter().copied().filter(|id| !known.contains(id)).collect())
    }

    /// Languages linked to a project
    pub async fn list_for_project(
        pool: &PgPool,
        kind: LanguageKind,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Language>(&format!(
            r#"
            SELECT l.id, l.name
            FROM {table} l
            JOIN {link} pl ON pl.language_id = l.id
            WHERE pl.project_id = $1
            ORDER BY l.name
            "#,
            table = kind.table(),
            link = kind.link_table(),
        ))
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Links a project to the given languages inside an open transaction
    pub async fn link_project(
        tx: &mut Transaction<'_, Postgres>,
        kind: LanguageKind,
        project_id: Uuid,
        ids: &[i32],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&format!(
            r#"
            INSERT INTO {} (project_id, language_id)
            SELECT $1, UNNEST($2::INTEGER[])
            ON CONFLICT DO NOTHING
            "#,
            kind.link_table()
        ))
        .bind(project_id)
        .bind(ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
