//! Ownership checks shared by the owner-scoped resources (bookings,
//! favorites, maintenance requests).

use crate::{auth::Identity, AppError, AppResult};

/// Row filter for list queries: staff see everything, everyone else only
/// their own rows.
pub fn owner_filter(ident: &Identity) -> Option<i64> {
    if ident.is_staff() {
        None
    } else {
        Some(ident.user_id)
    }
}

/// For writes where the URL already implies the row exists.
pub fn require_owner_or_staff(ident: &Identity, owner_id: i64) -> AppResult<()> {
    if ident.is_staff() || ident.user_id == owner_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// For reads by id: a row hidden by the policy is indistinguishable from
/// one that does not exist.
pub fn visible_to<T>(ident: &Identity, owner_id: i64, row: T) -> AppResult<T> {
    if ident.is_staff() || ident.user_id == owner_id {
        Ok(row)
    } else {
        Err(AppError::NotFound)
    }
}

/// Hostel and room writes belong to the owning manager; admins may step in.
pub fn require_manager_or_admin(ident: &Identity, manager_id: i64) -> AppResult<()> {
    if ident.is_admin || ident.user_id == manager_id {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AppError;

    fn renter() -> Identity {
        Identity { user_id: 7, is_manager: false, is_admin: false }
    }

    fn staff() -> Identity {
        Identity { user_id: 1, is_manager: true, is_admin: false }
    }

    #[test]
    fn staff_see_all_rows() {
        assert_eq!(owner_filter(&staff()), None);
        assert_eq!(owner_filter(&renter()), Some(7));
    }

    #[test]
    fn non_owner_write_is_forbidden() {
        assert!(require_owner_or_staff(&renter(), 7).is_ok());
        assert!(matches!(
            require_owner_or_staff(&renter(), 8),
            Err(AppError::Forbidden)
        ));
        assert!(require_owner_or_staff(&staff(), 8).is_ok());
    }

    #[test]
    fn hidden_rows_read_as_absent() {
        assert!(matches!(
            visible_to(&renter(), 8, ()),
            Err(AppError::NotFound)
        ));
        assert!(visible_to(&renter(), 7, ()).is_ok());
        assert!(visible_to(&staff(), 8, ()).is_ok());
    }

    #[test]
    fn hostel_writes_need_the_owning_manager() {
        // a manager flag alone does not grant writes on someone else's hostel
        assert!(matches!(
            require_manager_or_admin(&staff(), 99),
            Err(AppError::Forbidden)
        ));
        let admin = Identity { user_id: 2, is_manager: false, is_admin: true };
        assert!(require_manager_or_admin(&admin, 99).is_ok());
    }
}
