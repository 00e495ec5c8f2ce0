//! Heirloom Shamir Module
//!
//! Split a symmetric key into n shares such that any k reconstruct it and
//! fewer reveal nothing. Each share carries its own threshold metadata and
//! a SHA-256 integrity checksum, so reconstruction can reject both
//! too-few-shares and tampered shares instead of silently producing a
//! wrong key.

pub mod gf256;
pub mod shamir;

pub use shamir::{combine_shares, split_key, KeyShare};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShamirError {
    #[error("threshold must be at least 2")]
    InvalidThreshold,

    #[error("threshold {threshold} exceeds share count {total}")]
    ThresholdExceedsShares { threshold: u8, total: u8 },

    #[error("cannot split an empty secret")]
    EmptySecret,

    #[error("need {need} shares to reconstruct, have {have}")]
    InsufficientShares { need: u8, have: usize },

    #[error("share {index} failed its integrity checksum")]
    ChecksumMismatch { index: u8 },

    #[error("duplicate share index {0}")]
    DuplicateShareIndex(u8),

    #[error("shares disagree on {0}")]
    MismatchedShares(&'static str),

    #[error("invalid share: {0}")]
    InvalidShare(String),
}
