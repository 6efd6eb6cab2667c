//! Role and ownership rules
//!
//! The `can_*` predicates are pure and decide what a view offers (for
//! example whether the "enlist" button or the status form is shown). The
//! `require_*` functions apply the same rules to a mutating request and
//! return an [`AuthzError`], which the API layer turns into `403 Forbidden`.
//!
//! | Action                       | Allowed for                          |
//! |------------------------------|--------------------------------------|
//! | register a project           | customers                            |
//! | enlist in a project          | testers                              |
//! | report a bug                 | testers enlisted in the project      |
//! | change a bug's status        | owner of the bug's project           |
//! | add/delete project files     | owner of the project                 |
//! | add/delete bug files         | reporter of the bug, project owner   |
//!
//! # Example
//!
//! ```no_run
//! use urtest_shared::auth::authorization::{require_enlisted, AuthzError};
//! use urtest_shared::auth::context::AuthContext;
//! use sqlx::PgPool;
//! use uuid::Uuid;
//!
//! async fn before_bug_report(
//!     pool: &PgPool,
//!     auth: &AuthContext,
//!     project_id: Uuid,
//! ) -> Result<(), AuthzError> {
//!     require_enlisted(pool, auth, project_id).await
//! }
//! ```

use sqlx::PgPool;
use uuid::Uuid;

use super::context::AuthContext;
use crate::models::bug::Bug;
use crate::models::enlistment::Enlistment;
use crate::models::project::Project;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Only testers can do this")]
    NotTester,

    #[error("Only customers can do this")]
    NotCustomer,

    #[error("Only the owner of the project can do this")]
    NotProjectOwner,

    #[error("You must enlist in the project first")]
    NotEnlisted,

    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Whether the viewer owns the project
pub fn is_project_owner(viewer: Option<&AuthContext>, project: &Project) -> bool {
    viewer.is_some_and(|auth| auth.user_id == project.customer_id)
}

/// Whether the "enlist" action is offered
///
/// Testers who are already enlisted are not offered it again.
pub fn can_enlist(viewer: Option<&AuthContext>, already_enlisted: bool) -> bool {
    viewer.is_some_and(AuthContext::is_tester) && !already_enlisted
}

/// Whether the viewer may register projects
pub fn can_add_project(viewer: Option<&AuthContext>) -> bool {
    viewer.is_some_and(AuthContext::is_customer)
}

/// Whether the viewer may report a bug; `enlisted` is the viewer's enlistment
pub fn can_add_bug(viewer: Option<&AuthContext>, enlisted: bool) -> bool {
    viewer.is_some_and(AuthContext::is_tester) && enlisted
}

pub fn can_update_bug_status(viewer: Option<&AuthContext>, project: &Project) -> bool {
    is_project_owner(viewer, project)
}

pub fn can_manage_project_files(viewer: Option<&AuthContext>, project: &Project) -> bool {
    is_project_owner(viewer, project)
}

pub fn can_manage_bug_files(viewer: Option<&AuthContext>, bug: &Bug, project: &Project) -> bool {
    match viewer {
        Some(auth) => auth.user_id == bug.tester_id || auth.user_id == project.customer_id,
        None => false,
    }
}

pub fn require_tester(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_tester() {
        Ok(())
    } else {
        Err(AuthzError::NotTester)
    }
}

pub fn require_customer(auth: &AuthContext) -> Result<(), AuthzError> {
    if auth.is_customer() {
        Ok(())
    } else {
        Err(AuthzError::NotCustomer)
    }
}

pub fn require_project_owner(auth: &AuthContext, project: &Project) -> Result<(), AuthzError> {
    if is_project_owner(Some(auth), project) {
        Ok(())
    } else {
        Err(AuthzError::NotProjectOwner)
    }
}

pub fn require_bug_file_access(
    auth: &AuthContext,
    bug: &Bug,
    project: &Project,
) -> Result<(), AuthzError> {
    if can_manage_bug_files(Some(auth), bug, project) {
        Ok(())
    } else {
        Err(AuthzError::NotAuthorized)
    }
}

/// Requires a tester enlisted in the project
///
/// # Errors
///
/// `NotTester` for customers, `NotEnlisted` for testers outside the project.
pub async fn require_enlisted(
    pool: &PgPool,
    auth: &AuthContext,
    project_id: Uuid,
) -> Result<(), AuthzError> {
    require_tester(auth)?;

    if Enlistment::is_enlisted(pool, project_id, auth.user_id).await? {
        Ok(())
    } else {
        Err(AuthzError::NotEnlisted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bug::{BugSeverity, BugStatus};
    use crate::models::user::UserRole;
    use chrono::Utc;

    fn auth(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            username: "someone".to_string(),
            display_name: "Someone".to_string(),
            role,
        }
    }

    fn project(owner: &AuthContext) -> Project {
        Project {
            id: Uuid::new_v4(),
            name: "Foo".to_string(),
            size: 10,
            customer_id: owner.user_id,
            description: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn bug(project: &Project, reporter: &AuthContext) -> Bug {
        Bug {
            id: Uuid::new_v4(),
            project_id: project.id,
            tester_id: reporter.user_id,
            short_description: "crash".to_string(),
            finding_description: String::new(),
            full_description: String::new(),
            severity: BugSeverity::Medium,
            status: BugStatus::New,
            status_comment: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_only_unenlisted_testers_can_enlist() {
        let tester = auth(UserRole::Tester);
        let customer = auth(UserRole::Customer);

        assert!(can_enlist(Some(&tester), false));
        assert!(!can_enlist(Some(&tester), true));
        assert!(!can_enlist(Some(&customer), false));
        assert!(!can_enlist(None, false));
    }

    #[test]
    fn test_bug_reporting_requires_enlisted_tester() {
        let tester = auth(UserRole::Tester);
        let customer = auth(UserRole::Customer);

        assert!(can_add_bug(Some(&tester), true));
        assert!(!can_add_bug(Some(&tester), false));
        assert!(!can_add_bug(Some(&customer), true));
        assert!(!can_add_bug(None, true));
    }

    #[test]
    fn test_project_owner_rules() {
        let owner = auth(UserRole::Customer);
        let other_customer = auth(UserRole::Customer);
        let tester = auth(UserRole::Tester);
        let project = project(&owner);

        assert!(can_update_bug_status(Some(&owner), &project));
        assert!(can_manage_project_files(Some(&owner), &project));
        assert!(!can_update_bug_status(Some(&other_customer), &project));
        assert!(!can_update_bug_status(Some(&tester), &project));
        assert!(!can_update_bug_status(None, &project));

        assert!(require_project_owner(&owner, &project).is_ok());
        assert!(matches!(
            require_project_owner(&tester, &project),
            Err(AuthzError::NotProjectOwner)
        ));
    }

    #[test]
    fn test_bug_files_reporter_or_owner() {
        let owner = auth(UserRole::Customer);
        let reporter = auth(UserRole::Tester);
        let other_tester = auth(UserRole::Tester);
        let project = project(&owner);
        let bug = bug(&project, &reporter);

        assert!(can_manage_bug_files(Some(&reporter), &bug, &project));
        assert!(can_manage_bug_files(Some(&owner), &bug, &project));
        assert!(!can_manage_bug_files(Some(&other_tester), &bug, &project));
        assert!(!can_manage_bug_files(None, &bug, &project));

        assert!(matches!(
            require_bug_file_access(&other_tester, &bug, &project),
            Err(AuthzError::NotAuthorized)
        ));
    }

    #[test]
    fn test_role_requirements() {
        let tester = auth(UserRole::Tester);
        let customer = auth(UserRole::Customer);

        assert!(require_tester(&tester).is_ok());
        assert!(matches!(require_tester(&customer), Err(AuthzError::NotTester)));
        assert!(require_customer(&customer).is_ok());
        assert!(matches!(require_customer(&tester), Err(AuthzError::NotCustomer)));
        assert!(can_add_project(Some(&customer)));
        assert!(!can_add_project(Some(&tester)));
    }
}
