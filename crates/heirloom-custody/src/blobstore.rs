//! Content-addressed blob storage.
//!
//! The engine treats the CID as an opaque non-empty string; integrity
//! over the content itself comes from the payload hash recorded with the
//! will. The in-memory implementation here is the reference for hosts and
//! the workhorse for tests — production deployments plug in IPFS or any
//! other content-addressed store behind the same trait.

use crate::CustodyError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// A content identifier. Opaque and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cid(String);

impl Cid {
    pub fn new(inner: impl Into<String>) -> Self {
        Cid(inner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A content-addressed store: `put` returns the address, `get` resolves it.
pub trait BlobStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<Cid, CustodyError>;
    fn get(&self, cid: &Cid) -> Result<Vec<u8>, CustodyError>;
}

/// In-memory store addressing blobs by `hex(SHA-256(bytes))`.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().expect("blob store poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<Cid, CustodyError> {
        let address = hex::encode(Sha256::digest(bytes));
        self.blobs
            .lock()
            .expect("blob store poisoned")
            .insert(address.clone(), bytes.to_vec());
        Ok(Cid(address))
    }

    fn get(&self, cid: &Cid) -> Result<Vec<u8>, CustodyError> {
        let blobs = self.blobs.lock().expect("blob store poisoned");
        let bytes = blobs
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| CustodyError::BlobNotFound(cid.to_string()))?;

        // A content-addressed store that returns bytes not matching their
        // address is corrupt; check before handing anything back.
        if hex::encode(Sha256::digest(&bytes)) != cid.as_str() {
            return Err(CustodyError::PayloadHashMismatch {
                cid: cid.to_string(),
            });
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let store = MemoryBlobStore::new();
        let cid = store.put(b"ciphertext bytes").unwrap();
        assert!(!cid.is_empty());
        assert_eq!(store.get(&cid).unwrap(), b"ciphertext bytes");
    }

    #[test]
    fn test_addressing_is_content_derived() {
        let store = MemoryBlobStore::new();
        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        let c = store.put(b"different").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        // Identical content dedupes to one blob
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_missing_blob() {
        let store = MemoryBlobStore::new();
        let missing = Cid::new("deadbeef");
        assert!(matches!(
            store.get(&missing),
            Err(CustodyError::BlobNotFound(_))
        ));
    }
}
