//! The append-only event log.
//!
//! Every state-machine transition appends a typed event; consumers tail
//! the log out of band. Events are pure observations — nothing in the
//! engine reads them back to make decisions.

use crate::principal::Principal;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Events emitted by the engine, vault, and guardian registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A will was created.
    WillCreated {
        will_id: u64,
        owner: Principal,
        guardian_count: usize,
        beneficiary_count: usize,
    },

    /// The owner asserted liveness.
    Heartbeat { will_id: u64 },

    /// A guardian's approval bit was set for the first time.
    GuardianApproved {
        will_id: u64,
        guardian: Principal,
        /// Approvals after this one, out of the will's threshold.
        approvals: u32,
    },

    /// The will entered RELEASE_REQUESTED; the timelock is running.
    ReleaseRequested {
        will_id: u64,
        /// Earliest timestamp at which finalize can succeed.
        projected_release_ts: u64,
    },

    /// The will was finalized. Terminal.
    ReleaseFinalized {
        will_id: u64,
        beneficiaries: Vec<Principal>,
    },

    /// An asset was escrowed against a will.
    AssetDeposited {
        will_id: u64,
        index: usize,
        depositor: Principal,
    },

    /// One deposit record was distributed to one beneficiary.
    AssetReleased {
        will_id: u64,
        index: usize,
        beneficiary: Principal,
        amount: u128,
    },

    /// A depositor reclaimed an unreleased deposit.
    EmergencyWithdrawal {
        will_id: u64,
        index: usize,
        depositor: Principal,
    },

    /// A guardian registered with the directory.
    GuardianRegistered { guardian: Principal },

    /// Admin toggled a guardian's verification flag.
    GuardianVerified { guardian: Principal, verified: bool },

    /// A guardian was deactivated.
    GuardianDeactivated { guardian: Principal },

    /// A guardian published a share-possession commitment.
    CommitmentAdded {
        guardian: Principal,
        commitment: [u8; 32],
    },

    /// A guardian's reputation changed.
    ReputationUpdated { guardian: Principal, reputation: u32 },
}

/// An event plus its position and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Zero-based, strictly increasing sequence number.
    pub seq: u64,
    /// Engine clock at append time (Unix seconds).
    pub at: u64,
    pub event: Event,
}

/// Append-only, in-memory event log shared between components.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Mutex<Vec<RecordedEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, at: u64, event: Event) {
        let mut entries = self.entries.lock().expect("event log poisoned");
        let seq = entries.len() as u64;
        entries.push(RecordedEvent { seq, at, event });
    }

    /// Everything at or after `from_seq`. Consumers remember their own
    /// cursor and poll.
    pub fn tail(&self, from_seq: u64) -> Vec<RecordedEvent> {
        let entries = self.entries.lock().expect("event log poisoned");
        entries
            .iter()
            .skip(from_seq as usize)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> u64 {
        self.entries.lock().expect("event log poisoned").len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
