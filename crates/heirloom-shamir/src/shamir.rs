//! Key splitting and reconstruction.
//!
//! One random polynomial of degree k−1 per secret byte; share i holds the
//! polynomial evaluations at x = i. Reconstruction interpolates each byte
//! at x = 0.

use crate::gf256::{interpolate_at_zero, poly_eval};
use crate::ShamirError;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// One of n fragments of a split key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Share index, 1-based. Index 0 would leak the secret (p(0) is the
    /// secret itself) and is never issued.
    pub index: u8,
    /// Per-byte polynomial evaluations; same length as the secret.
    pub bytes: Vec<u8>,
    /// Shares needed to reconstruct.
    pub threshold: u8,
    /// Total shares issued in this split.
    pub total: u8,
    /// Unix seconds when the split was performed.
    pub created_at: u64,
    /// SHA-256 of `bytes`; verified before any reconstruction.
    pub checksum: [u8; 32],
}

impl KeyShare {
    /// Recompute the checksum and compare against the stored one.
    pub fn verify_checksum(&self) -> bool {
        checksum_of(&self.bytes) == self.checksum
    }
}

fn checksum_of(bytes: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(bytes);
    digest.into()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Split `secret` into `total` shares with reconstruction threshold
/// `threshold`.
///
/// Requires 2 ≤ threshold ≤ total (≤ 255 by the index type). The secret
/// must be non-empty; callers split symmetric keys, typically 32 bytes.
pub fn split_key(secret: &[u8], total: u8, threshold: u8) -> Result<Vec<KeyShare>, ShamirError> {
    if threshold < 2 {
        return Err(ShamirError::InvalidThreshold);
    }
    if threshold > total {
        return Err(ShamirError::ThresholdExceedsShares { threshold, total });
    }
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }

    let mut rng = rand::rngs::OsRng;
    let created_at = unix_now();

    let mut share_bytes: Vec<Vec<u8>> = vec![Vec::with_capacity(secret.len()); total as usize];

    // One polynomial per secret byte:
    // p(x) = secret_byte + c₁x + … + c_{k-1}x^{k-1}, cᵢ random
    let mut coefficients = vec![0u8; threshold as usize];
    for &secret_byte in secret {
        coefficients[0] = secret_byte;
        rng.fill_bytes(&mut coefficients[1..]);

        for (slot, bytes) in share_bytes.iter_mut().enumerate() {
            let x = (slot + 1) as u8;
            bytes.push(poly_eval(&coefficients, x));
        }
    }

    Ok(share_bytes
        .into_iter()
        .enumerate()
        .map(|(slot, bytes)| {
            let checksum = checksum_of(&bytes);
            KeyShare {
                index: (slot + 1) as u8,
                bytes,
                threshold,
                total,
                created_at,
                checksum,
            }
        })
        .collect())
}

/// Reconstruct the secret from any `threshold` of the issued shares.
///
/// Rejects: fewer shares than the embedded threshold, duplicate indices,
/// shares from different splits (mismatched threshold/total/length), and
/// any share whose checksum fails.
pub fn combine_shares(shares: &[KeyShare]) -> Result<Vec<u8>, ShamirError> {
    let first = shares.first().ok_or(ShamirError::InsufficientShares {
        need: 2,
        have: 0,
    })?;

    if shares.len() < first.threshold as usize {
        return Err(ShamirError::InsufficientShares {
            need: first.threshold,
            have: shares.len(),
        });
    }

    for share in shares {
        if share.threshold != first.threshold || share.total != first.total {
            return Err(ShamirError::MismatchedShares("threshold metadata"));
        }
        if share.bytes.len() != first.bytes.len() {
            return Err(ShamirError::MismatchedShares("share length"));
        }
        if share.index == 0 {
            return Err(ShamirError::InvalidShare("share index 0".into()));
        }
        if !share.verify_checksum() {
            return Err(ShamirError::ChecksumMismatch { index: share.index });
        }
    }

    let mut seen = [false; 256];
    for share in shares {
        if seen[share.index as usize] {
            return Err(ShamirError::DuplicateShareIndex(share.index));
        }
        seen[share.index as usize] = true;
    }

    // Interpolation degree is fixed by the threshold; extra shares are
    // ignored rather than averaged in.
    let subset = &shares[..first.threshold as usize];

    let mut secret = Vec::with_capacity(first.bytes.len());
    for byte_idx in 0..first.bytes.len() {
        let points: Vec<(u8, u8)> = subset
            .iter()
            .map(|s| (s.index, s.bytes[byte_idx]))
            .collect();
        secret.push(interpolate_at_zero(&points));
    }

    Ok(secret)
}
