//! Error taxonomy for the engine-side components.
//!
//! Every validation failure surfaces to the caller without partial state
//! change; transfer failures are per-asset and do not abort a release
//! batch.

use crate::auth::Role;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Input validation failed: size, range, duplicate, or null principal.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Caller is not the will's owner.
    #[error("caller is not the will owner")]
    NotOwner,

    /// Caller is not in the will's guardian list.
    #[error("caller is not a guardian of this will")]
    NotGuardian,

    /// Caller lacks the role the operation requires.
    #[error("caller lacks required role {required:?}")]
    Unauthorized { required: Role },

    /// The will has already been finalized. Terminal.
    #[error("will {0} already released")]
    AlreadyReleased(u64),

    /// Finalize called before any release request.
    #[error("release has not been requested for will {0}")]
    NotRequested(u64),

    /// Finalize called before the timelock expired.
    #[error("timelock not expired: releasable at {releasable_at}, now {now}")]
    TimelockNotExpired { releasable_at: u64, now: u64 },

    /// Unknown will id.
    #[error("will {0} not found")]
    WillNotFound(u64),

    /// An external asset transfer failed. The affected deposit record is
    /// rolled back; the rest of the batch stands.
    #[error("asset transfer failed: {0}")]
    TransferFailed(String),

    /// Vault bookkeeping mismatch. Not expected in normal operation.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// A Shamir share failed its integrity checksum.
    #[error("share {index} failed its integrity checksum")]
    ChecksumMismatch { index: u8 },

    /// The admin pause gate is active.
    #[error("engine is paused")]
    Paused,
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameters(msg.into())
    }
}
