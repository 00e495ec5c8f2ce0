//! Heirloom Custody Module
//!
//! Client-side secret handling for a will: encrypt the payload, split the
//! key into guardian shares, upload the ciphertext to a content-addressed
//! store, and later reconstruct the plaintext from any quorum of shares.
//!
//! Nothing here touches Will Engine state. The engine stores only the
//! opaque CID and the 32-byte payload hash this module produces; the
//! plaintext and the key never leave the client.

pub mod blobstore;
pub mod commitment;
pub mod crypto;
pub mod package;

pub use blobstore::{BlobStore, Cid, MemoryBlobStore};
pub use commitment::{commit_share, verify_commit};
pub use crypto::{decrypt, encrypt, generate_key, Algorithm, SealedPayload};
pub use package::{create_will_package, recover_payload, GuardianShare, WillPackage};

use heirloom_shamir::ShamirError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key, or ciphertext tampered. GCM does not distinguish.
    #[error("decryption failed: bad key or tampered ciphertext")]
    DecryptionFailed,

    #[error("invalid sealed payload format")]
    InvalidFormat,

    #[error("cannot seal an empty payload")]
    EmptyPayload,

    #[error("guardian count {0} exceeds the 255-share limit")]
    TooManyGuardians(usize),

    #[error("blob not found: {0}")]
    BlobNotFound(String),

    /// The downloaded blob does not hash to the recorded payload hash.
    #[error("payload hash mismatch for {cid}")]
    PayloadHashMismatch { cid: String },

    #[error(transparent)]
    Shamir(#[from] ShamirError),
}
