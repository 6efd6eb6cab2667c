//! # urtest Shared Library
//!
//! Types, queries and helpers shared by the urtest API server and its tests.
//!
//! ## Module Organization
//!
//! - `models`: Database models (users, projects, bugs, attachments) and their queries
//! - `auth`: Password hashing, session tokens and role/ownership checks
//! - `db`: Connection pool and migrations
//! - `storage`: Id-namespaced file store for uploaded attachments

pub mod auth;
pub mod db;
pub mod models;
pub mod storage;

/// Current version of the urtest shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
