//! # urtest web server library
//!
//! HTTP side of the urtest bug tracker: customers publish projects, testers
//! enlist and report bugs, both attach files.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Environment configuration
//! - `error`: Error handling and HTTP response mapping
//! - `forms`: Submitted form parsing and validation
//! - `middleware`: Session resolution, login guard, security headers
//! - `routes`: Route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod forms;
pub mod middleware;
pub mod routes;
