#![allow(dead_code)]

use drp_acl::{AclConflictResolution, AclOptions, ObjectAcl};
use drp_crypto::Keychain;
use drp_object::{DrpObject, ObjectOptions};
use drp_types::{PeerId, ReplicatedType, Vertex};

pub fn keychain(seed: u8) -> Keychain {
    let mut bytes = [0u8; 32];
    bytes[0] = seed;
    bytes[31] = 0x5a;
    Keychain::from_seed(bytes).unwrap()
}

/// ACL where every listed peer is an admin. Peers are `(name, seed)`.
pub fn admins(peers: &[(&str, u8)], resolution: AclConflictResolution) -> ObjectAcl {
    let mut options = AclOptions {
        conflict_resolution: resolution,
        ..AclOptions::default()
    };
    for (name, seed) in peers {
        options
            .admins
            .insert(PeerId::new(*name), keychain(*seed).public_credential());
    }
    ObjectAcl::new(options)
}

pub fn object<T: ReplicatedType>(name: &str, seed: u8, acl: &ObjectAcl, drp: T) -> DrpObject<T> {
    DrpObject::new(
        ObjectOptions::new(name)
            .with_keychain(keychain(seed))
            .with_acl(acl.clone())
            .with_drp(drp)
            .with_id("shared"),
    )
    .unwrap()
}

/// Deliver `from`'s whole history to `to` and assert nothing was missing.
pub fn deliver<T: ReplicatedType>(from: &DrpObject<T>, to: &mut DrpObject<T>) {
    let vertices: Vec<Vertex> = from.vertices().to_vec();
    let (ok, missing) = to.merge(&vertices).unwrap();
    assert!(ok, "{} could not merge {missing:?}", to.peer_id());
}

/// Full anti-entropy round between every pair of peers.
pub fn sync_all<T: ReplicatedType>(peers: &mut [DrpObject<T>]) {
    let union: Vec<Vertex> = peers
        .iter()
        .flat_map(|p| p.vertices().iter().cloned())
        .collect();
    for peer in peers.iter_mut() {
        let (ok, missing) = peer.merge(&union).unwrap();
        assert!(ok, "{} could not merge {missing:?}", peer.peer_id());
    }
}

pub fn assert_converged<T: ReplicatedType>(peers: &[DrpObject<T>]) {
    let first = &peers[0];
    for other in &peers[1..] {
        assert_eq!(first.frontier(), other.frontier());
        assert_eq!(first.drp(), other.drp());
        assert_eq!(first.acl(), other.acl());
        assert_eq!(first.vertices().len(), other.vertices().len());
    }
}
