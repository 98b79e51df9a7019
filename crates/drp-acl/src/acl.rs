//! The replicated access-control list.
//!
//! # Invariants
//!
//! - Initial admins hold the admin and finality groups, plus writer unless
//!   the ACL is permissionless. Granting admin later adds only the admin
//!   group; finality and writer are granted separately.
//! - Admin membership is never revoked, and no group can be revoked from an
//!   admin.
//! - Every listed peer has a public credential, fixed when the peer is
//!   first granted a group.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use drp_types::{
    ActionType, ConflictResolver, PeerId, PublicCredential, ReplicatedType, ResolveConflictsType,
    SemanticsType, Vertex,
};

use crate::config::{AclConflictResolution, AclOptions};
use crate::error::AclError;

/// Permission groups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AclGroup {
    Admin,
    Finality,
    Writer,
}

/// A peer's credential and the groups it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPermissions {
    pub public_key: PublicCredential,
    pub permissions: BTreeSet<AclGroup>,
}

/// Mutating ACL commands, carried on the access-control track.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "opType", content = "value")]
pub enum AclOp {
    #[serde(rename = "grant")]
    Grant {
        peer_id: PeerId,
        group: AclGroup,
        public_key: Option<PublicCredential>,
    },
    #[serde(rename = "revoke")]
    Revoke { peer_id: PeerId, group: AclGroup },
}

impl AclOp {
    /// The peer whose permissions change.
    pub fn subject(&self) -> &PeerId {
        match self {
            Self::Grant { peer_id, .. } | Self::Revoke { peer_id, .. } => peer_id,
        }
    }

    fn is_grant(&self) -> bool {
        matches!(self, Self::Grant { .. })
    }
}

/// Replicated capability store of one object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectAcl {
    permissionless: bool,
    conflict_resolution: AclConflictResolution,
    authorized_peers: BTreeMap<PeerId, PeerPermissions>,
}

impl ObjectAcl {
    pub fn new(options: AclOptions) -> Self {
        let mut admin_groups = BTreeSet::from([AclGroup::Admin, AclGroup::Finality]);
        if !options.permissionless {
            admin_groups.insert(AclGroup::Writer);
        }
        let authorized_peers = options
            .admins
            .into_iter()
            .map(|(peer, public_key)| {
                (
                    peer,
                    PeerPermissions {
                        public_key,
                        permissions: admin_groups.clone(),
                    },
                )
            })
            .collect();
        Self {
            permissionless: options.permissionless,
            conflict_resolution: options.conflict_resolution,
            authorized_peers,
        }
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    pub fn permissionless(&self) -> bool {
        self.permissionless
    }

    pub fn conflict_resolution(&self) -> AclConflictResolution {
        self.conflict_resolution
    }

    fn in_group(&self, peer: &PeerId, group: AclGroup) -> bool {
        self.authorized_peers
            .get(peer)
            .is_some_and(|p| p.permissions.contains(&group))
    }

    pub fn is_admin(&self, peer: &PeerId) -> bool {
        self.in_group(peer, AclGroup::Admin)
    }

    pub fn is_writer(&self, peer: &PeerId) -> bool {
        self.in_group(peer, AclGroup::Writer)
    }

    pub fn is_finality_signer(&self, peer: &PeerId) -> bool {
        self.in_group(peer, AclGroup::Finality)
    }

    /// Writer check used to gate local calls and merges.
    pub fn can_write(&self, peer: &PeerId) -> bool {
        self.permissionless || self.is_writer(peer)
    }

    pub fn peer_key(&self, peer: &PeerId) -> Option<&PublicCredential> {
        self.authorized_peers.get(peer).map(|p| &p.public_key)
    }

    /// Finality signers and their credentials, ordered by peer id.
    pub fn finality_signers(&self) -> BTreeMap<PeerId, PublicCredential> {
        self.authorized_peers
            .iter()
            .filter(|(_, p)| p.permissions.contains(&AclGroup::Finality))
            .map(|(peer, p)| (peer.clone(), p.public_key.clone()))
            .collect()
    }

    pub fn peers(&self) -> &BTreeMap<PeerId, PeerPermissions> {
        &self.authorized_peers
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    pub fn grant(
        &mut self,
        sender: &PeerId,
        peer: &PeerId,
        group: AclGroup,
        public_key: Option<PublicCredential>,
    ) -> Result<(), AclError> {
        if !self.is_admin(sender) {
            return Err(AclError::NotAdmin(sender.clone()));
        }
        if group == AclGroup::Writer && self.permissionless {
            return Err(AclError::PermissionlessWriter(peer.clone()));
        }
        let entry = match self.authorized_peers.entry(peer.clone()) {
            // A known peer keeps its credential.
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                let Some(key) = public_key else {
                    return Err(AclError::MissingPublicKey(peer.clone()));
                };
                vacant.insert(PeerPermissions {
                    public_key: key,
                    permissions: BTreeSet::new(),
                })
            }
        };
        entry.permissions.insert(group);
        debug!(%sender, %peer, ?group, "acl grant");
        Ok(())
    }

    pub fn revoke(&mut self, sender: &PeerId, peer: &PeerId, group: AclGroup) -> Result<(), AclError> {
        if !self.is_admin(sender) {
            return Err(AclError::NotAdmin(sender.clone()));
        }
        if self.is_admin(peer) {
            return Err(AclError::AdminIrrevocable(peer.clone()));
        }
        if let Some(entry) = self.authorized_peers.get_mut(peer) {
            entry.permissions.remove(&group);
        }
        debug!(%sender, %peer, ?group, "acl revoke");
        Ok(())
    }
}

impl ConflictResolver for ObjectAcl {
    fn semantics(&self) -> SemanticsType {
        SemanticsType::Pair
    }

    /// Concurrent grant and revoke on the same peer are ordered by the
    /// configured policy; everything else is left alone.
    fn resolve_conflicts(&self, vertices: &[&Vertex]) -> ResolveConflictsType {
        let [left, right] = vertices else {
            return ResolveConflictsType::nop();
        };
        let (Some(l), Some(r)) = (left.decode_op::<AclOp>(), right.decode_op::<AclOp>()) else {
            return ResolveConflictsType::nop();
        };
        if l.is_grant() == r.is_grant() || l.subject() != r.subject() {
            return ResolveConflictsType::nop();
        }
        let grant_on_left = l.is_grant();
        let action = match (self.conflict_resolution, grant_on_left) {
            (AclConflictResolution::GrantWins, true) => ActionType::DropRight,
            (AclConflictResolution::GrantWins, false) => ActionType::DropLeft,
            (AclConflictResolution::RevokeWins, true) => ActionType::DropLeft,
            (AclConflictResolution::RevokeWins, false) => ActionType::DropRight,
        };
        ResolveConflictsType::new(action)
    }
}

impl ReplicatedType for ObjectAcl {
    type Op = AclOp;
    type Error = AclError;

    fn apply(&mut self, caller: &PeerId, op: AclOp) -> Result<(), AclError> {
        match op {
            AclOp::Grant {
                peer_id,
                group,
                public_key,
            } => self.grant(caller, &peer_id, group, public_key),
            AclOp::Revoke { peer_id, group } => self.revoke(caller, &peer_id, group),
        }
    }
}
