//! The vault service.
//!
//! Locking is striped per will id: the outer map lock is held only long
//! enough to fetch or create a will's holdings cell, then each will's
//! operations serialize on their own lock. Deposits and releases for
//! distinct wills proceed in parallel.

use crate::deposit::{AssetKind, DepositRecord, TokenId};
use crate::transfer::{AssetTransfer, TransferError};
use heirloom_core::{Auth, Clock, Error, Event, EventLog, Principal, Role, BPS_DENOMINATOR};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct WillHoldings {
    deposits: Vec<DepositRecord>,
    /// Escrowed native value still in the vault for this will.
    native_balance: u128,
    /// First native depositor; later deposits never overwrite it.
    first_depositor: Option<Principal>,
}

/// Outcome of one `release_assets` batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Deposit indices distributed in this batch.
    pub released: Vec<usize>,
    /// Deposit indices whose external transfer failed and were rolled
    /// back; retry-able in a later batch.
    pub failed: Vec<usize>,
}

pub struct AssetVault {
    holdings: Mutex<HashMap<u64, Arc<Mutex<WillHoldings>>>>,
    /// Native value held across all wills.
    total_native_held: Mutex<u128>,
    transfer: Arc<dyn AssetTransfer>,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
}

impl AssetVault {
    pub fn new(
        transfer: Arc<dyn AssetTransfer>,
        events: Arc<EventLog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            holdings: Mutex::new(HashMap::new()),
            total_native_held: Mutex::new(0),
            transfer,
            events,
            clock,
        }
    }

    /// Escrow native value against a will.
    pub fn deposit_native(&self, auth: &Auth, will_id: u64, amount: u128) -> Result<usize, Error> {
        if amount == 0 {
            return Err(Error::invalid("native deposit must be positive"));
        }
        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");

        holdings.native_balance += amount;
        if holdings.first_depositor.is_none() {
            holdings.first_depositor = Some(auth.principal());
        }
        *self.total_native_held.lock().expect("vault total poisoned") += amount;

        self.push_record(&mut holdings, will_id, auth, AssetKind::Native { amount })
    }

    /// Escrow fungible tokens. The host has already transferred them in.
    pub fn deposit_fungible(
        &self,
        auth: &Auth,
        will_id: u64,
        token: TokenId,
        amount: u128,
    ) -> Result<usize, Error> {
        if amount == 0 {
            return Err(Error::invalid("fungible deposit must be positive"));
        }
        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");
        self.push_record(&mut holdings, will_id, auth, AssetKind::Fungible { token, amount })
    }

    /// Escrow a unique item.
    pub fn deposit_unique(
        &self,
        auth: &Auth,
        will_id: u64,
        token: TokenId,
        id: u128,
    ) -> Result<usize, Error> {
        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");
        self.push_record(&mut holdings, will_id, auth, AssetKind::Unique { token, id })
    }

    /// Escrow semi-fungible tokens: both the id and the amount are kept.
    pub fn deposit_semi_fungible(
        &self,
        auth: &Auth,
        will_id: u64,
        token: TokenId,
        id: u128,
        amount: u128,
    ) -> Result<usize, Error> {
        if amount == 0 {
            return Err(Error::invalid("semi-fungible deposit must be positive"));
        }
        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");
        self.push_record(
            &mut holdings,
            will_id,
            auth,
            AssetKind::SemiFungible { token, id, amount },
        )
    }

    /// Distribute every unreleased deposit of `will_id` to `beneficiaries`
    /// by basis-point `shares_bp`. Will Engine only.
    ///
    /// Each record is marked released *before* its external transfer
    /// starts; a failed transfer rolls back only that record. Divisible
    /// quantities split as `floor(q · bp / 10000)` with the dust staying
    /// in the vault; unique items go whole to beneficiary 0.
    pub fn release_assets(
        &self,
        auth: &Auth,
        will_id: u64,
        beneficiaries: &[Principal],
        shares_bp: &[u16],
    ) -> Result<ReleaseReport, Error> {
        auth.require(Role::WillManager)?;
        validate_shares(beneficiaries, shares_bp)?;

        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");
        let now = self.clock.now_secs();

        let mut report = ReleaseReport {
            released: Vec::new(),
            failed: Vec::new(),
        };

        for index in 0..holdings.deposits.len() {
            if holdings.deposits[index].released {
                continue;
            }

            // At-most-once guard goes up before any external call
            holdings.deposits[index].released = true;
            let asset = holdings.deposits[index].asset.clone();

            match self.distribute(will_id, index, &asset, beneficiaries, shares_bp, now) {
                Ok(distributed_native) => {
                    holdings.native_balance -= distributed_native;
                    *self.total_native_held.lock().expect("vault total poisoned") -=
                        distributed_native;
                    report.released.push(index);
                }
                Err(e) => {
                    holdings.deposits[index].released = false;
                    log::warn!(
                        "transfer failed for will {} deposit {}: {}",
                        will_id,
                        index,
                        e
                    );
                    report.failed.push(index);
                }
            }
        }

        if report.failed.is_empty() {
            Ok(report)
        } else {
            // Successes stay committed; the error names what to retry
            Err(Error::TransferFailed(format!(
                "will {}: deposits {:?} failed to transfer ({} released)",
                will_id,
                report.failed,
                report.released.len()
            )))
        }
    }

    /// One record's distribution. Returns the native value that left the
    /// vault, for balance accounting.
    fn distribute(
        &self,
        will_id: u64,
        index: usize,
        asset: &AssetKind,
        beneficiaries: &[Principal],
        shares_bp: &[u16],
        now: u64,
    ) -> Result<u128, TransferError> {
        let mut native_out = 0u128;

        match asset {
            AssetKind::Unique { token, id } => {
                // Indivisible: the whole item to beneficiary 0
                let recipient = beneficiaries[0];
                self.transfer.transfer_unique(token, recipient, *id)?;
                self.events.append(
                    now,
                    Event::AssetReleased {
                        will_id,
                        index,
                        beneficiary: recipient,
                        amount: 1,
                    },
                );
            }
            _ => {
                let quantity = asset
                    .divisible_amount()
                    .expect("non-unique assets are divisible");

                for (&beneficiary, &bp) in beneficiaries.iter().zip(shares_bp) {
                    let portion = bps_portion(quantity, bp);
                    if portion == 0 {
                        continue;
                    }

                    match asset {
                        AssetKind::Native { .. } => {
                            self.transfer.transfer_native(beneficiary, portion)?;
                            native_out += portion;
                        }
                        AssetKind::Fungible { token, .. } => {
                            self.transfer.transfer_fungible(token, beneficiary, portion)?;
                        }
                        AssetKind::SemiFungible { token, id, .. } => {
                            self.transfer
                                .transfer_semi_fungible(token, beneficiary, *id, portion)?;
                        }
                        AssetKind::Unique { .. } => unreachable!("handled above"),
                    }

                    self.events.append(
                        now,
                        Event::AssetReleased {
                            will_id,
                            index,
                            beneficiary,
                            amount: portion,
                        },
                    );
                }
            }
        }

        Ok(native_out)
    }

    /// Return an unreleased deposit to its depositor.
    ///
    /// Works regardless of will or engine state — a paused engine must
    /// never strand assets.
    pub fn emergency_withdraw(
        &self,
        auth: &Auth,
        will_id: u64,
        asset_index: usize,
    ) -> Result<(), Error> {
        let cell = self.cell(will_id);
        let mut holdings = cell.lock().expect("vault holdings poisoned");

        let record = holdings
            .deposits
            .get_mut(asset_index)
            .ok_or_else(|| Error::invalid(format!("no deposit {asset_index} for will {will_id}")))?;

        if record.depositor != auth.principal() {
            return Err(Error::invalid("only the original depositor may withdraw"));
        }
        if record.released {
            return Err(Error::AlreadyReleased(will_id));
        }

        record.released = true;
        let asset = record.asset.clone();
        let depositor = auth.principal();

        let result = match &asset {
            AssetKind::Native { amount } => self
                .transfer
                .transfer_native(depositor, *amount)
                .map(|()| *amount),
            AssetKind::Fungible { token, amount } => self
                .transfer
                .transfer_fungible(token, depositor, *amount)
                .map(|()| 0),
            AssetKind::Unique { token, id } => self
                .transfer
                .transfer_unique(token, depositor, *id)
                .map(|()| 0),
            AssetKind::SemiFungible { token, id, amount } => self
                .transfer
                .transfer_semi_fungible(token, depositor, *id, *amount)
                .map(|()| 0),
        };

        match result {
            Ok(native_out) => {
                holdings.native_balance -= native_out;
                *self.total_native_held.lock().expect("vault total poisoned") -= native_out;

                log::info!("emergency withdrawal: will {} deposit {}", will_id, asset_index);
                self.events.append(
                    self.clock.now_secs(),
                    Event::EmergencyWithdrawal {
                        will_id,
                        index: asset_index,
                        depositor,
                    },
                );
                Ok(())
            }
            Err(e) => {
                holdings.deposits[asset_index].released = false;
                Err(Error::TransferFailed(e.to_string()))
            }
        }
    }

    /// Snapshot of a will's deposit records.
    pub fn deposits(&self, will_id: u64) -> Vec<DepositRecord> {
        let cell = self.cell(will_id);
        let holdings = cell.lock().expect("vault holdings poisoned");
        holdings.deposits.clone()
    }

    /// Native value still escrowed for one will.
    pub fn will_native_balance(&self, will_id: u64) -> u128 {
        let cell = self.cell(will_id);
        let balance = cell.lock().expect("vault holdings poisoned").native_balance;
        balance
    }

    /// First native depositor for a will, if any.
    pub fn first_depositor(&self, will_id: u64) -> Option<Principal> {
        let cell = self.cell(will_id);
        let depositor = cell.lock().expect("vault holdings poisoned").first_depositor;
        depositor
    }

    /// Native value escrowed across all wills.
    pub fn total_native_held(&self) -> u128 {
        *self.total_native_held.lock().expect("vault total poisoned")
    }

    fn cell(&self, will_id: u64) -> Arc<Mutex<WillHoldings>> {
        let mut holdings = self.holdings.lock().expect("vault map poisoned");
        holdings
            .entry(will_id)
            .or_insert_with(|| Arc::new(Mutex::new(WillHoldings::default())))
            .clone()
    }

    fn push_record(
        &self,
        holdings: &mut WillHoldings,
        will_id: u64,
        auth: &Auth,
        asset: AssetKind,
    ) -> Result<usize, Error> {
        let now = self.clock.now_secs();
        let index = holdings.deposits.len();
        holdings.deposits.push(DepositRecord {
            asset,
            depositor: auth.principal(),
            released: false,
            deposited_at: now,
        });

        self.events.append(
            now,
            Event::AssetDeposited {
                will_id,
                index,
                depositor: auth.principal(),
            },
        );
        Ok(index)
    }
}

/// `floor(quantity · bp / 10000)` without overflow: split the quotient
/// and remainder so the intermediate product stays small.
fn bps_portion(quantity: u128, bp: u16) -> u128 {
    let denom = BPS_DENOMINATOR as u128;
    let bp = bp as u128;
    (quantity / denom) * bp + (quantity % denom) * bp / denom
}

fn validate_shares(beneficiaries: &[Principal], shares_bp: &[u16]) -> Result<(), Error> {
    if beneficiaries.is_empty() {
        return Err(Error::invalid("at least one beneficiary required"));
    }
    if beneficiaries.len() != shares_bp.len() {
        return Err(Error::invalid(format!(
            "{} beneficiaries but {} shares",
            beneficiaries.len(),
            shares_bp.len()
        )));
    }
    if beneficiaries.iter().any(Principal::is_null) {
        return Err(Error::invalid("null beneficiary"));
    }
    let total: u64 = shares_bp.iter().map(|&bp| bp as u64).sum();
    if total != BPS_DENOMINATOR {
        return Err(Error::invalid(format!(
            "shares sum to {total}, expected {BPS_DENOMINATOR}"
        )));
    }
    Ok(())
}
