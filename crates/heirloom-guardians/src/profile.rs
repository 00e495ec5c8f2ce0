//! Guardian profile data.

use crate::REPUTATION_START;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-instance registry limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianLimits {
    /// Minimum reputation required to be attached to a new will.
    pub min_reputation: u32,
    /// Maximum wills a single guardian may protect at once.
    pub max_wills_per_guardian: u32,
}

impl Default for GuardianLimits {
    fn default() -> Self {
        Self {
            min_reputation: 50,
            max_wills_per_guardian: 100,
        }
    }
}

/// One guardian's directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianProfile {
    /// Deactivated guardians keep their history but cannot take on work.
    pub active: bool,
    /// Set by an admin after off-band identity verification.
    pub verified: bool,
    /// Where the guardian publishes contact/recovery instructions.
    pub metadata_uri: String,
    /// Hash of the guardian's communication public key.
    pub public_key_hash: [u8; 32],
    /// Merkle root over the guardian's share commitments.
    pub commitment_root: [u8; 32],
    /// 0..=1000; starts at [`REPUTATION_START`].
    pub reputation: u32,
    /// Active wills currently referencing this guardian.
    pub total_wills: u32,
    pub successful_releases: u32,
    /// Unix seconds at registration.
    pub registration_time: u64,
    /// Share-possession commitments published by this guardian.
    pub commitments: BTreeSet<[u8; 32]>,
}

impl GuardianProfile {
    pub fn new(
        metadata_uri: String,
        public_key_hash: [u8; 32],
        commitment_root: [u8; 32],
        registration_time: u64,
    ) -> Self {
        Self {
            active: true,
            verified: false,
            metadata_uri,
            public_key_hash,
            commitment_root,
            reputation: REPUTATION_START,
            total_wills: 0,
            successful_releases: 0,
            registration_time,
            commitments: BTreeSet::new(),
        }
    }

    /// Whether this guardian can be attached to a new will under `limits`.
    pub fn eligible(&self, min_reputation: u32, max_wills: u32) -> bool {
        self.active
            && self.verified
            && self.reputation >= min_reputation
            && self.total_wills < max_wills
    }
}
