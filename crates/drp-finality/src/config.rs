use serde::{Deserialize, Serialize};

/// Finality parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalityConfig {
    /// Fraction of the signer roster needed to finalize a vertex.
    pub finality_threshold: f64,
}

impl Default for FinalityConfig {
    fn default() -> Self {
        Self {
            finality_threshold: 0.51,
        }
    }
}

impl FinalityConfig {
    /// Signatures needed for a roster of `signers`.
    pub fn quorum(&self, signers: usize) -> usize {
        (signers as f64 * self.finality_threshold).ceil() as usize
    }
}
