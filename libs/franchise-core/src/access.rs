//! Case visibility and permission gates

use crate::error::{FranchiseError, Result};
use crate::models::{Case, Permission};
use crate::session::SessionContext;

/// Whether `user_id` with `all_case_access` may see `case`
#[must_use]
pub fn can_view_case(case: &Case, user_id: &str, all_case_access: bool) -> bool {
    all_case_access || case.is_assigned(user_id)
}

/// Cases the signed-in user may see
///
/// Admins and holders of `allCaseAccess` see everything; everyone else sees
/// the cases they are assigned to. Signed out, nothing is visible.
#[must_use]
pub fn visible_cases(session: &SessionContext, cases: Vec<Case>) -> Vec<Case> {
    let Ok(user_id) = session.user_id() else {
        return Vec::new();
    };
    let all = session.can(Permission::AllCaseAccess);
    cases
        .into_iter()
        .filter(|case| can_view_case(case, &user_id, all))
        .collect()
}

/// Fail unless the signed-in user may see `case`
///
/// # Errors
/// Returns `FranchiseError::Unauthenticated` when signed out and
/// `FranchiseError::PermissionDenied` when the case is not visible
pub fn require_case_access(session: &SessionContext, case: &Case) -> Result<()> {
    let user_id = session.user_id()?;
    if can_view_case(case, &user_id, session.can(Permission::AllCaseAccess)) {
        Ok(())
    } else {
        Err(FranchiseError::permission_denied(format!(
            "case {}",
            case.id
        )))
    }
}

/// Gate for changing statuses
///
/// # Errors
/// Returns an error unless the user holds `edit` and can see the case
pub fn require_edit(session: &SessionContext, case: &Case) -> Result<()> {
    session.require(Permission::Edit)?;
    require_case_access(session, case)
}

/// Gate for writing remarks
///
/// # Errors
/// Returns an error unless the user holds `remarks` and can see the case
pub fn require_remarks(session: &SessionContext, case: &Case) -> Result<()> {
    session.require(Permission::Remarks)?;
    require_case_access(session, case)
}

/// Gate for deleting remarks
///
/// # Errors
/// Returns an error unless the user holds `delete` and can see the case
pub fn require_delete(session: &SessionContext, case: &Case) -> Result<()> {
    session.require(Permission::Delete)?;
    require_case_access(session, case)
}
