//! Database models for urtest
//!
//! Each model is a plain record (`sqlx::FromRow`) with associated async
//! query functions taking a `PgPool` (or an open transaction).
//!
//! # Models
//!
//! - `user`: Tester and customer accounts
//! - `language`: Programming / documentation language reference tables
//! - `project`: Projects owned by customers
//! - `enlistment`: Tester ↔ project relation
//! - `bug`: Bugs filed by testers against projects
//! - `attachment`: Files attached to projects and bugs
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::models::project::Project;
//! use urtest_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//! let projects = Project::list(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod attachment;
pub mod bug;
pub mod enlistment;
pub mod language;
pub mod project;
pub mod user;
