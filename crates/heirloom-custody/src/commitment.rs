//! Share-possession commitments.
//!
//! A guardian publishes `H(share_bytes ‖ index ‖ salt)` on-chain; later
//! they can prove possession of the share by revealing it together with
//! the salt, without the share ever appearing in public state.

use heirloom_shamir::KeyShare;
use sha2::{Digest, Sha256};

/// Commit to a share: `SHA-256(bytes ‖ decimal(index) ‖ salt)`.
pub fn commit_share(share: &KeyShare, salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(&share.bytes);
    hasher.update(share.index.to_string().as_bytes());
    hasher.update(salt);
    hasher.finalize().into()
}

/// Check a share and salt against a published commitment.
pub fn verify_commit(share: &KeyShare, salt: &[u8], digest: &[u8; 32]) -> bool {
    commit_share(share, salt) == *digest
}
