//! Identity of the logged-in user for one request

use serde::Serialize;
use uuid::Uuid;

use crate::models::user::{User, UserRole};

/// Authenticated user attached to a request
///
/// Built from the database row on every request, never from the token
/// alone, so role and username are current.
#[derive(Debug, Clone, Serialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: UserRole,
}

impl AuthContext {
    pub fn from_user(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
        }
    }

    pub fn is_tester(&self) -> bool {
        self.role == UserRole::Tester
    }

    pub fn is_customer(&self) -> bool {
        self.role == UserRole::Customer
    }
}
