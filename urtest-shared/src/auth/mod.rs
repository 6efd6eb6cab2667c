//! Authentication and authorization
//!
//! - [`password`]: Argon2id hashing and the registration password policy
//! - [`jwt`]: signed session tokens carried in the session cookie
//! - [`context`]: the logged-in user attached to a request
//! - [`authorization`]: role and ownership rules

pub mod authorization;
pub mod context;
pub mod jwt;
pub mod password;
