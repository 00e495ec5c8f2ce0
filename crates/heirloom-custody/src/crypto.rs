//! Payload encryption.
//!
//! AES-256-GCM with a random 96-bit nonce per call. GCM authenticates the
//! ciphertext, so decryption fails loudly on tampering instead of
//! returning garbage. The algorithm is recorded alongside the ciphertext
//! for future agility.

use crate::CustodyError;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use zeroize::Zeroizing;

/// Nonce length for AES-256-GCM.
const NONCE_LEN: usize = 12;

/// GCM appends a 16-byte authentication tag to the ciphertext.
const TAG_LEN: usize = 16;

/// Framing version for [`SealedPayload::to_bytes`].
const FORMAT_VERSION: u8 = 1;

/// Header: version (1) + algorithm (1) + timestamp (8) + nonce (12).
const HEADER_LEN: usize = 1 + 1 + 8 + NONCE_LEN;

/// Cipher used to seal a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Aes256Gcm,
}

impl Algorithm {
    fn tag(self) -> u8 {
        match self {
            Algorithm::Aes256Gcm => 1,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Algorithm::Aes256Gcm),
            _ => None,
        }
    }
}

/// An encrypted payload plus the metadata needed to decrypt it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    /// Ciphertext with the GCM tag appended.
    pub ciphertext: Vec<u8>,
    /// Per-encryption random nonce.
    pub nonce: [u8; NONCE_LEN],
    /// Cipher identifier, for future agility.
    pub algorithm: Algorithm,
    /// Unix seconds when the payload was sealed.
    pub created_at: u64,
}

impl SealedPayload {
    /// Serialize: version ‖ algorithm ‖ timestamp ‖ nonce ‖ ciphertext.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        bytes.push(FORMAT_VERSION);
        bytes.push(self.algorithm.tag());
        bytes.extend_from_slice(&self.created_at.to_be_bytes());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Deserialize. Never panics on arbitrary input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CustodyError> {
        // Shortest valid blob: header + empty-plaintext ciphertext (tag only)
        if bytes.len() < HEADER_LEN + TAG_LEN {
            return Err(CustodyError::InvalidFormat);
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(CustodyError::InvalidFormat);
        }
        let algorithm = Algorithm::from_tag(bytes[1]).ok_or(CustodyError::InvalidFormat)?;

        let mut ts = [0u8; 8];
        ts.copy_from_slice(&bytes[2..10]);

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&bytes[10..HEADER_LEN]);

        Ok(SealedPayload {
            ciphertext: bytes[HEADER_LEN..].to_vec(),
            nonce,
            algorithm,
            created_at: u64::from_be_bytes(ts),
        })
    }
}

/// Generate a fresh 256-bit payload key. Zeroed from memory on drop.
pub fn generate_key() -> Zeroizing<[u8; 32]> {
    let key = Aes256Gcm::generate_key(&mut OsRng);
    let mut out = Zeroizing::new([0u8; 32]);
    out.copy_from_slice(&key);
    out
}

/// Seal `plaintext` under `key`.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<SealedPayload, CustodyError> {
    if plaintext.is_empty() {
        return Err(CustodyError::EmptyPayload);
    }

    let nonce_arr = Aes256Gcm::generate_nonce(&mut OsRng);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&nonce_arr);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CustodyError::EncryptionFailed(e.to_string()))?;

    let created_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Ok(SealedPayload {
        ciphertext,
        nonce,
        algorithm: Algorithm::Aes256Gcm,
        created_at,
    })
}

/// Open a sealed payload. Fails on a wrong key or any tampering.
pub fn decrypt(sealed: &SealedPayload, key: &[u8; 32]) -> Result<Zeroizing<Vec<u8>>, CustodyError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| CustodyError::DecryptionFailed)?;
    Ok(Zeroizing::new(plaintext))
}
