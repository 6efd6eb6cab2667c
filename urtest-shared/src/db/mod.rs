//! Database access: connection pool and schema migrations
//!
//! Queries live on the model types in [`crate::models`].

pub mod migrations;
pub mod pool;
