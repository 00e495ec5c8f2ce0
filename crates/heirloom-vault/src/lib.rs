//! Heirloom Asset Vault
//!
//! Escrow for the assets a will distributes: native value, fungible
//! tokens, unique items, and semi-fungible tokens, all keyed by will id.
//! The vault distributes on command from the Will Engine and lets the
//! original depositor pull an unreleased deposit back out at any time.
//!
//! The vault deliberately knows nothing about will state. A release
//! command arrives with the beneficiary list and shares; emergency
//! withdrawal works even when the engine is paused, so a stuck admin can
//! never strand assets.

pub mod deposit;
pub mod transfer;
pub mod vault;

pub use deposit::{AssetKind, DepositRecord, TokenId};
pub use transfer::{AssetTransfer, LedgerTransfer, TransferError};
pub use vault::{AssetVault, ReleaseReport};
