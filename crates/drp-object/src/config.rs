use serde::{Deserialize, Serialize};

use drp_acl::ObjectAcl;
use drp_crypto::Keychain;
use drp_finality::FinalityConfig;
use drp_types::{PeerId, PublicCredential};

/// Per-object settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub finality: FinalityConfig,
    /// Reject merged vertices that carry no verifiable author signature.
    /// Signatures that are present are always checked.
    pub require_signatures: bool,
}

/// Everything needed to build a [`DrpObject`](crate::DrpObject).
#[derive(Debug)]
pub struct ObjectOptions<T> {
    pub peer_id: PeerId,
    /// Used to make the local peer the sole admin when `acl` is `None`.
    pub public_credential: Option<PublicCredential>,
    pub acl: Option<ObjectAcl>,
    pub drp: Option<T>,
    /// Object id; derived from the peer id and a random nonce when `None`.
    pub id: Option<String>,
    pub config: ObjectConfig,
    /// Signs local vertices and finality attestations.
    pub keychain: Option<Keychain>,
}

impl<T> ObjectOptions<T> {
    pub fn new(peer_id: impl Into<PeerId>) -> Self {
        Self {
            peer_id: peer_id.into(),
            public_credential: None,
            acl: None,
            drp: None,
            id: None,
            config: ObjectConfig::default(),
            keychain: None,
        }
    }

    /// Install a keychain and take the public credential from it.
    pub fn with_keychain(mut self, keychain: Keychain) -> Self {
        self.public_credential = Some(keychain.public_credential());
        self.keychain = Some(keychain);
        self
    }

    pub fn with_acl(mut self, acl: ObjectAcl) -> Self {
        self.acl = Some(acl);
        self
    }

    pub fn with_drp(mut self, drp: T) -> Self {
        self.drp = Some(drp);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_config(mut self, config: ObjectConfig) -> Self {
        self.config = config;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ObjectConfig::default();
        assert!(!config.require_signatures);
        assert_eq!(config.finality.finality_threshold, 0.51);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: ObjectConfig = toml::from_str("require_signatures = true").unwrap();
        assert!(config.require_signatures);
        assert_eq!(config.finality, FinalityConfig::default());

        let config: ObjectConfig = toml::from_str("[finality]\nfinality_threshold = 0.75").unwrap();
        assert_eq!(config.finality.finality_threshold, 0.75);
    }

    #[test]
    fn keychain_supplies_credential() {
        let keychain = Keychain::from_seed([4; 32]).unwrap();
        let credential = keychain.public_credential();
        let options = ObjectOptions::<()>::new("p1").with_keychain(keychain);
        assert_eq!(options.public_credential, Some(credential));
        assert_eq!(options.peer_id.as_str(), "p1");
    }
}
