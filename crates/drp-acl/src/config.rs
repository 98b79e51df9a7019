use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use drp_types::{PeerId, PublicCredential};

/// Which side wins when a grant and a revoke for the same peer are concurrent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclConflictResolution {
    GrantWins,
    #[default]
    RevokeWins,
}

/// Construction options for an [`ObjectAcl`](crate::ObjectAcl).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AclOptions {
    /// Initial admins and their public credentials.
    pub admins: BTreeMap<PeerId, PublicCredential>,
    /// When `true`, anyone may write and the writer group cannot be granted.
    pub permissionless: bool,
    pub conflict_resolution: AclConflictResolution,
}

impl AclOptions {
    /// Options with a single admin and default policy.
    pub fn single_admin(peer_id: PeerId, credential: PublicCredential) -> Self {
        Self {
            admins: BTreeMap::from([(peer_id, credential)]),
            ..Default::default()
        }
    }
}
