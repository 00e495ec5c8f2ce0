//! The external transfer seam.
//!
//! The vault never moves value itself; it instructs an [`AssetTransfer`]
//! adapter supplied by the host. [`LedgerTransfer`] is the in-memory
//! reference adapter: it credits balances to a ledger that tests and the
//! server's dry-run mode can inspect.

use crate::deposit::TokenId;
use heirloom_core::Principal;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Why an external transfer failed. Opaque to the vault beyond the
/// message; the host adapter knows the details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransferError(pub String);

/// Host adapter that moves value out of escrow.
///
/// The vault retries a failed deposit record wholesale on the next
/// release batch, so each call must either apply atomically or be
/// idempotent under retry on the host side.
pub trait AssetTransfer: Send + Sync {
    fn transfer_native(&self, to: Principal, amount: u128) -> Result<(), TransferError>;

    fn transfer_fungible(
        &self,
        token: &TokenId,
        to: Principal,
        amount: u128,
    ) -> Result<(), TransferError>;

    fn transfer_unique(&self, token: &TokenId, to: Principal, id: u128)
        -> Result<(), TransferError>;

    fn transfer_semi_fungible(
        &self,
        token: &TokenId,
        to: Principal,
        id: u128,
        amount: u128,
    ) -> Result<(), TransferError>;
}

/// In-memory adapter crediting an inspectable ledger.
#[derive(Debug, Default)]
pub struct LedgerTransfer {
    /// (token scope, recipient) → fungible balance. `None` token = native.
    balances: Mutex<HashMap<(Option<TokenId>, Principal), u128>>,
    /// (token, id) → current owner, for unique items.
    unique_owners: Mutex<HashMap<(TokenId, u128), Principal>>,
    /// (token, id, recipient) → semi-fungible balance.
    semi_balances: Mutex<HashMap<(TokenId, u128, Principal), u128>>,
}

impl LedgerTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn native_balance(&self, of: Principal) -> u128 {
        *self
            .balances
            .lock()
            .expect("ledger poisoned")
            .get(&(None, of))
            .unwrap_or(&0)
    }

    pub fn fungible_balance(&self, token: &TokenId, of: Principal) -> u128 {
        *self
            .balances
            .lock()
            .expect("ledger poisoned")
            .get(&(Some(token.clone()), of))
            .unwrap_or(&0)
    }

    pub fn unique_owner(&self, token: &TokenId, id: u128) -> Option<Principal> {
        self.unique_owners
            .lock()
            .expect("ledger poisoned")
            .get(&(token.clone(), id))
            .copied()
    }

    pub fn semi_fungible_balance(&self, token: &TokenId, id: u128, of: Principal) -> u128 {
        *self
            .semi_balances
            .lock()
            .expect("ledger poisoned")
            .get(&(token.clone(), id, of))
            .unwrap_or(&0)
    }
}

impl AssetTransfer for LedgerTransfer {
    fn transfer_native(&self, to: Principal, amount: u128) -> Result<(), TransferError> {
        let mut balances = self.balances.lock().expect("ledger poisoned");
        *balances.entry((None, to)).or_insert(0) += amount;
        Ok(())
    }

    fn transfer_fungible(
        &self,
        token: &TokenId,
        to: Principal,
        amount: u128,
    ) -> Result<(), TransferError> {
        let mut balances = self.balances.lock().expect("ledger poisoned");
        *balances.entry((Some(token.clone()), to)).or_insert(0) += amount;
        Ok(())
    }

    fn transfer_unique(
        &self,
        token: &TokenId,
        to: Principal,
        id: u128,
    ) -> Result<(), TransferError> {
        let mut owners = self.unique_owners.lock().expect("ledger poisoned");
        owners.insert((token.clone(), id), to);
        Ok(())
    }

    fn transfer_semi_fungible(
        &self,
        token: &TokenId,
        to: Principal,
        id: u128,
        amount: u128,
    ) -> Result<(), TransferError> {
        let mut balances = self.semi_balances.lock().expect("ledger poisoned");
        *balances.entry((token.clone(), id, to)).or_insert(0) += amount;
        Ok(())
    }
}
