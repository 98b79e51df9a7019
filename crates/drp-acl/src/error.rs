use drp_types::{ErrorClass, PeerId};

/// Errors raised when applying ACL operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AclError {
    /// Only admins may grant or revoke.
    #[error("peer {0} is not an admin")]
    NotAdmin(PeerId),

    /// A peer seen for the first time must come with its public credential.
    #[error("granting to unknown peer {0} requires a public credential")]
    MissingPublicKey(PeerId),

    /// The writer group does not exist in permissionless mode.
    #[error("cannot grant writer to {0}: the ACL is permissionless")]
    PermissionlessWriter(PeerId),

    /// Admins keep every permission forever.
    #[error("cannot revoke permissions of admin {0}")]
    AdminIrrevocable(PeerId),
}

impl AclError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::MissingPublicKey(_) => ErrorClass::Structural,
            _ => ErrorClass::Permission,
        }
    }
}
