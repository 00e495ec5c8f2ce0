//! Principal identities.
//!
//! A principal is whatever the host ledger uses to identify a caller —
//! an account, an address, a public key hash. The engine only compares
//! principals for equality and never interprets the bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// An opaque 32-byte host identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal([u8; 32]);

impl Principal {
    /// The all-zero principal. Never a valid owner, guardian, or
    /// beneficiary; used as the "null" sentinel at the host boundary.
    pub const NULL: Principal = Principal([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Principal(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Deterministic principal from a small test label. Test helper only;
    /// real principals come from the host.
    pub fn from_label(label: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[31] = label;
        bytes[0] = 0x01;
        Principal(bytes)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form: first four bytes are enough to tell principals apart in logs
        write!(f, "Principal({}…)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for Principal {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s)?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Principal(bytes))
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
