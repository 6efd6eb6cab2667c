//! Session tokens
//!
//! A logged-in browser carries one HS256 JWT in the session cookie. The
//! token names the user and the role they had at login; the server still
//! reloads the user on every request, so a deleted account loses its
//! session immediately.
//!
//! # Claims
//!
//! - `sub`: user id
//! - `role`: `tester` or `customer`
//! - `iss`: always `"urtest"`
//! - `iat` / `nbf` / `exp`: Unix timestamps
//!
//! # Example
//!
//! ```
//! use urtest_shared::auth::jwt::{create_token, validate_token, SessionClaims};
//! use urtest_shared::models::user::UserRole;
//! use chrono::Duration;
//! use uuid::Uuid;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let user_id = Uuid::new_v4();
//! let claims = SessionClaims::new(user_id, UserRole::Tester, Duration::hours(24));
//! let token = create_token(&claims, "a-secret-of-at-least-32-bytes!!!")?;
//!
//! let validated = validate_token(&token, "a-secret-of-at-least-32-bytes!!!")?;
//! assert_eq!(validated.sub, user_id);
//! # Ok(())
//! # }
//! ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::UserRole;

/// Issuer stamped into every session token
pub const SESSION_ISSUER: &str = "urtest";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid issuer")]
    InvalidIssuer,
}

/// Claims of a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User ID
    pub sub: Uuid,

    /// Role at login time
    pub role: UserRole,

    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
}

impl SessionClaims {
    /// Claims valid from now for `ttl`
    pub fn new(user_id: Uuid, role: UserRole, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            role,
            iss: SESSION_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            nbf: now.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &SessionClaims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp` and `nbf`, returning the claims
pub fn validate_token(token: &str, secret: &str) -> Result<SessionClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[SESSION_ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::ValidationError(e.to_string()),
        })
}
