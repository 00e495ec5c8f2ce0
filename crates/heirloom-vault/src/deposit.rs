//! Deposit records.

use heirloom_core::Principal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External identifier of a token scope (a contract address, a mint, a
/// ledger symbol). Opaque to the vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What was deposited. A tagged sum, not an overloaded quantity field:
/// semi-fungibles track their id *and* their amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    Native {
        amount: u128,
    },
    Fungible {
        token: TokenId,
        amount: u128,
    },
    Unique {
        token: TokenId,
        id: u128,
    },
    SemiFungible {
        token: TokenId,
        id: u128,
        amount: u128,
    },
}

impl AssetKind {
    /// The divisible quantity, if this asset class has one.
    pub fn divisible_amount(&self) -> Option<u128> {
        match self {
            AssetKind::Native { amount }
            | AssetKind::Fungible { amount, .. }
            | AssetKind::SemiFungible { amount, .. } => Some(*amount),
            AssetKind::Unique { .. } => None,
        }
    }
}

/// One escrowed deposit. Keyed by `(will_id, index)` in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub asset: AssetKind,
    /// Who made this deposit; the only principal allowed to withdraw it
    /// in an emergency.
    pub depositor: Principal,
    /// At-most-once guard. Set before any external transfer starts.
    pub released: bool,
    /// Unix seconds at deposit time.
    pub deposited_at: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semi_fungible_keeps_id_and_amount() {
        let asset = AssetKind::SemiFungible {
            token: TokenId("game-items".into()),
            id: 7,
            amount: 1_000,
        };
        // Both survive a serialization roundtrip independently
        let json = serde_json::to_string(&asset).unwrap();
        let back: AssetKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
        assert_eq!(asset.divisible_amount(), Some(1_000));
    }

    #[test]
    fn test_unique_is_indivisible() {
        let asset = AssetKind::Unique {
            token: TokenId("deeds".into()),
            id: 42,
        };
        assert_eq!(asset.divisible_amount(), None);
    }
}
