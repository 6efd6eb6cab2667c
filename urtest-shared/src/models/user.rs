//! User model and database operations
//!
//! Testers and customers live in one `users` table. The `role` column is the
//! polymorphism switch; customers additionally carry a `customer_kind`
//! (physical person or legal entity) and legal customers an organization name.
//!
//! # Schema
//!
//! ```sql
//! CREATE TYPE user_role AS ENUM ('tester', 'customer');
//! CREATE TYPE customer_kind AS ENUM ('physical', 'legal');
//!
//! CREATE TABLE users (
//!     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
//!     username VARCHAR(30) NOT NULL,          -- unique on LOWER(username)
//!     email VARCHAR(255) NOT NULL,
//!     password_hash VARCHAR(255) NOT NULL,
//!     display_name VARCHAR(100) NOT NULL,
//!     role user_role NOT NULL,
//!     customer_kind customer_kind,            -- NOT NULL iff role = 'customer'
//!     organization VARCHAR(200),              -- required for legal customers
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     last_login_at TIMESTAMPTZ
//! );
//! ```
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::models::user::{CreateUser, User};
//! use urtest_shared::db::pool::{create_pool, DatabaseConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool(DatabaseConfig::default()).await?;
//!
//! let tester = User::create(&pool, CreateUser::tester(
//!     "alice",
//!     "alice@example.com",
//!     "$argon2id$...",
//!     "Alice Smith",
//! )).await?;
//!
//! let found = User::find_by_username(&pool, "ALICE").await?;
//! assert_eq!(found.map(|u| u.id), Some(tester.id));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Enlists in projects and files bugs
    Tester,

    /// Owns projects and resolves their bugs
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Tester => "tester",
            UserRole::Customer => "customer",
        }
    }
}

/// Customer subtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "customer_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CustomerKind {
    /// Private person
    Physical,

    /// Company / legal entity
    Legal,
}

impl CustomerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerKind::Physical => "physical",
            CustomerKind::Legal => "legal",
        }
    }

    /// Parses the path segment used by the registration routes
    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "physical" => Some(CustomerKind::Physical),
            "legal" => Some(CustomerKind::Legal),
            _ => None,
        }
    }
}

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,

    /// Login name, unique ignoring case
    pub username: String,

    /// Contact address, kept out of rendered pages
    #[serde(skip_serializing, default)]
    pub email: String,

    /// Argon2id password hash, never rendered
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Full name for testers and physical customers
    pub display_name: String,

    pub role: UserRole,

    /// Set for customers only
    pub customer_kind: Option<CustomerKind>,

    /// Set for legal customers only
    pub organization: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_tester(&self) -> bool {
        self.role == UserRole::Tester
    }

    pub fn is_customer(&self) -> bool {
        self.role == UserRole::Customer
    }

    /// Path of the user's public profile page
    pub fn profile_path(&self) -> String {
        match self.role {
            UserRole::Tester => format!("/testers/show/{}", self.id),
            UserRole::Customer => format!("/companies/show/{}", self.id),
        }
    }
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,

    /// Argon2id password hash (NOT plaintext password!)
    pub password_hash: String,

    pub display_name: String,
    pub role: UserRole,
    pub customer_kind: Option<CustomerKind>,
    pub organization: Option<String>,
}

impl CreateUser {
    /// Input for a tester account
    pub fn tester(username: &str, email: &str, password_hash: &str, display_name: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            display_name: display_name.to_string(),
            role: UserRole::Tester,
            customer_kind: None,
            organization: None,
        }
    }

    /// Input for a customer account of the given kind
    pub fn customer(
        kind: CustomerKind,
        username: &str,
        email: &str,
        password_hash: &str,
        display_name: &str,
        organization: Option<String>,
    ) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            display_name: display_name.to_string(),
            role: UserRole::Customer,
            customer_kind: Some(kind),
            organization: match kind {
                CustomerKind::Legal => organization,
                CustomerKind::Physical => None,
            },
        }
    }
}

/// Unique index on LOWER(username)
pub const USERNAME_CONSTRAINT: &str = "users_username_key";

const USER_COLUMNS: &str = "id, username, email, password_hash, display_name, role, \
     customer_kind, organization, created_at, updated_at, last_login_at";

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken ([`USERNAME_CONSTRAINT`])
    /// or the database is unreachable.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, display_name, role,
                               customer_kind, organization)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(data.username)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.display_name)
        .bind(data.role)
        .bind(data.customer_kind)
        .bind(data.organization)
        .fetch_one(pool)
        .await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User created");
        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a user with the given role, None if the id belongs to someone else
    ///
    /// Used by the tester / company profile pages so that a customer id under
    /// `/testers/show/` is a 404 rather than a mislabelled page.
    pub async fn find_by_id_and_role(
        pool: &PgPool,
        id: Uuid,
        role: UserRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND role = $2"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by username, ignoring case
    pub async fn find_by_username(
        pool: &PgPool,
        username: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(pool)
        .await
    }

    /// Checks whether a username is already registered
    pub async fn username_exists(pool: &PgPool, username: &str) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE LOWER(username) = LOWER($1))",
        )
        .bind(username)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Lists all users of one role, newest first
    pub async fn list_by_role(pool: &PgPool, role: UserRole) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY created_at DESC"
        ))
        .bind(role)
        .fetch_all(pool)
        .await
    }

    /// Updates the last login timestamp for a user
    pub async fn update_last_login(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user by ID (cascades to owned projects, enlistments and bugs)
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
