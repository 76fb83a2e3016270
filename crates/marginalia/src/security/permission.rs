//! Permission checking utilities

use super::Role;
use crate::error::{LibraryError, LibraryResult};

/// Operation classes gated by role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageCatalog,
    Read,
    Annotate,
}

/// Check if a role carries a capability
pub fn check_permission(role: Role, capability: Capability) -> bool {
    match capability {
        Capability::ManageCatalog => role.can_manage_catalog(),
        Capability::Read => role.can_read(),
        Capability::Annotate => role.can_annotate(),
    }
}

/// Fail with `Forbidden` unless the role carries the capability
pub fn require(role: Role, capability: Capability, action: &str) -> LibraryResult<()> {
    if check_permission(role, capability) {
        Ok(())
    } else {
        tracing::debug!(%role, ?capability, action, "capability check failed");
        Err(LibraryError::forbidden(permission_denied_message(role, action)))
    }
}

/// Fail with `Forbidden` unless the requester authored the record.
/// Admin gets no override here.
pub fn require_owner(requester: Role, owner: Role, action: &str) -> LibraryResult<()> {
    if requester == owner {
        Ok(())
    } else {
        Err(LibraryError::forbidden(format!(
            "only the creator ({}) may {}",
            owner, action
        )))
    }
}

/// Permission denied error message
pub fn permission_denied_message(role: Role, action: &str) -> String {
    format!("role {} may not {}", role, action)
}
