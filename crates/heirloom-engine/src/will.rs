//! The will record and its state predicates.
//!
//! State is encoded by `{released, release_requested}` plus the derived
//! predicate "heartbeat expired". There is no path back from
//! RELEASE_REQUESTED to CREATED, and RELEASED is terminal.

use heirloom_core::{Principal, RELEASE_TIMELOCK};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One will. Owned by the engine; hosts see snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Will {
    pub id: u64,
    /// Creator. Immutable.
    pub owner: Principal,
    /// Ordered, pairwise distinct, 1..=50. Immutable.
    pub beneficiaries: Vec<Principal>,
    /// Ordered, pairwise distinct, 1..=20, none equal to the owner.
    /// A guardian's position here is its approval-bitmap index.
    pub guardians: Vec<Principal>,
    /// Companion lookup: principal → bitmap index.
    pub(crate) guardian_index: HashMap<Principal, u8>,
    /// Approvals needed for quorum: 1..=|guardians|. Immutable.
    pub guardian_threshold: u8,
    /// Opaque blob-store address of the sealed payload. Non-empty.
    pub encrypted_cid: String,
    /// SHA-256 over the sealed payload; the on-chain integrity witness.
    pub payload_hash: [u8; 32],
    /// Seconds of owner silence before guardians can move. Immutable.
    pub heartbeat_timeout: u64,
    /// Last proof of life. Only ever increases, and only while not
    /// released.
    pub last_heartbeat: u64,
    /// External custody scope; `None` for secrets-only wills.
    pub vault_address: Option<String>,
    /// Bit i set ⇔ guardian i has approved. Bits only ever go 0→1.
    pub approvals_bitmap: u32,
    /// Explicit per-beneficiary basis points, if the owner set them.
    /// Absent ⇒ equal split with the remainder to beneficiary 0.
    pub shares_bp: Option<Vec<u16>>,
    pub release_requested: bool,
    /// Non-zero exactly when `release_requested`.
    pub release_request_ts: u64,
    /// Terminal. Once set, no field mutates again.
    pub released: bool,
    pub created_at: u64,
}

impl Will {
    /// Bitmap index of a guardian, if the principal is one.
    pub fn guardian_bit(&self, principal: &Principal) -> Option<u8> {
        self.guardian_index.get(principal).copied()
    }

    /// Current approval count — a native popcount, constant work.
    pub fn approvals(&self) -> u32 {
        self.approvals_bitmap.count_ones()
    }

    pub fn quorum_met(&self) -> bool {
        self.approvals() >= self.guardian_threshold as u32
    }

    pub fn heartbeat_expired(&self, now: u64) -> bool {
        now >= self.last_heartbeat.saturating_add(self.heartbeat_timeout)
    }

    /// The release-eligibility predicate: not released, owner present,
    /// liveness timer expired, quorum met.
    pub fn is_eligible_for_release(&self, now: u64) -> bool {
        !self.released
            && !self.owner.is_null()
            && self.heartbeat_expired(now)
            && self.quorum_met()
    }

    /// Earliest instant finalize can succeed, once requested.
    pub fn releasable_at(&self) -> Option<u64> {
        self.release_requested
            .then(|| self.release_request_ts.saturating_add(RELEASE_TIMELOCK))
    }

    /// Guardians whose approval bit is set, in bitmap order.
    pub fn approvers(&self) -> Vec<Principal> {
        self.guardians
            .iter()
            .enumerate()
            .filter(|(i, _)| self.approvals_bitmap & (1 << i) != 0)
            .map(|(_, &g)| g)
            .collect()
    }
}

/// Equal-split shares: `10000 / n` each, remainder to beneficiary 0.
pub fn equal_shares(n: usize) -> Vec<u16> {
    debug_assert!(n > 0);
    let base = (10_000 / n) as u16;
    let remainder = (10_000 % n) as u16;
    let mut shares = vec![base; n];
    shares[0] += remainder;
    shares
}
