//! End-to-end will packaging.
//!
//! `create_will_package` is what a wallet runs when the owner writes
//! their will: generate a key, seal the payload, split the key across the
//! guardians, upload the sealed blob, and hand back everything the host
//! needs to call `create_will` — plus the per-guardian shares to deliver
//! off-band.

use crate::blobstore::{BlobStore, Cid};
use crate::crypto::{decrypt, encrypt, generate_key, SealedPayload};
use crate::CustodyError;
use heirloom_core::Principal;
use heirloom_shamir::{combine_shares, split_key, KeyShare};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use zeroize::Zeroizing;

/// A share addressed to one guardian. Delivered off-band; never stored
/// with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardianShare {
    pub guardian: Principal,
    pub share: KeyShare,
}

/// Everything produced by packaging a will.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WillPackage {
    /// Address of the sealed payload in the blob store.
    pub encrypted_cid: Cid,
    /// SHA-256 over the sealed blob bytes; the engine stores this as its
    /// integrity witness.
    pub payload_hash: [u8; 32],
    /// One key share per guardian, in guardian-list order.
    pub shares: Vec<GuardianShare>,
    /// Shares needed to reconstruct the key.
    pub threshold: u8,
    /// Free-form wallet metadata (labels, notes). Not interpreted here.
    pub metadata: BTreeMap<String, String>,
}

/// Package a plaintext will for `guardians` with reconstruction
/// threshold `threshold`.
pub fn create_will_package(
    plaintext: &[u8],
    guardians: &[Principal],
    threshold: u8,
    store: &dyn BlobStore,
    metadata: BTreeMap<String, String>,
) -> Result<WillPackage, CustodyError> {
    if guardians.len() > 255 {
        return Err(CustodyError::TooManyGuardians(guardians.len()));
    }

    let key = generate_key();
    let sealed = encrypt(plaintext, &key)?;
    let blob = sealed.to_bytes();

    let payload_hash: [u8; 32] = Sha256::digest(&blob).into();

    let shares = split_key(&*key, guardians.len() as u8, threshold)?;
    let encrypted_cid = store.put(&blob)?;

    Ok(WillPackage {
        encrypted_cid,
        payload_hash,
        shares: guardians
            .iter()
            .zip(shares)
            .map(|(&guardian, share)| GuardianShare { guardian, share })
            .collect(),
        threshold,
        metadata,
    })
}

/// Reconstruct the plaintext from quorum-provided shares.
///
/// Downloads the sealed blob by CID, checks it against the recorded
/// payload hash, combines the shares into the key, and decrypts.
pub fn recover_payload(
    encrypted_cid: &Cid,
    payload_hash: &[u8; 32],
    shares: &[KeyShare],
    store: &dyn BlobStore,
) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
    let blob = store.get(encrypted_cid)?;

    let actual: [u8; 32] = Sha256::digest(&blob).into();
    if actual != *payload_hash {
        return Err(CustodyError::PayloadHashMismatch {
            cid: encrypted_cid.to_string(),
        });
    }

    let sealed = SealedPayload::from_bytes(&blob)?;

    let key_bytes = Zeroizing::new(combine_shares(shares)?);
    let key: [u8; 32] = key_bytes
        .as_slice()
        .try_into()
        .map_err(|_| CustodyError::DecryptionFailed)?;

    decrypt(&sealed, &key)
}
