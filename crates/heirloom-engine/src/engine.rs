//! The will engine service.
//!
//! All will-state mutations run to completion atomically under the
//! engine lock; external I/O (asset transfers) happens only after the
//! will's own transition has committed. The engine is an instance, not a
//! process singleton — tests and multi-tenant hosts run several side by
//! side.

use crate::dispatch::ReleaseDispatcher;
use crate::will::{equal_shares, Will};
use crate::engine_auth;
use heirloom_core::{
    Auth, Clock, Error, Event, EventLog, Principal, Role, MAX_BENEFICIARIES, MAX_GUARDIANS,
    MAX_HEARTBEAT_TIMEOUT, MIN_HEARTBEAT_TIMEOUT, RELEASE_TIMELOCK,
};
use heirloom_guardians::GuardianRegistry;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Parameters for [`WillEngine::create_will`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWill {
    pub guardians: Vec<Principal>,
    pub guardian_threshold: u8,
    pub encrypted_cid: String,
    pub payload_hash: [u8; 32],
    /// Seconds of owner silence before guardians can move.
    pub heartbeat_timeout: u64,
    pub beneficiaries: Vec<Principal>,
    /// External custody scope; `None` for secrets-only wills.
    pub vault_address: Option<String>,
}

#[derive(Debug, Default)]
struct EngineState {
    wills: HashMap<u64, Will>,
    next_will_id: u64,
    /// Ring of will ids awaiting periodic eligibility checks.
    pending: Vec<u64>,
    /// Ring cursor; advances by `batch_size` per poll, wrapping.
    pending_cursor: usize,
}

pub struct WillEngine {
    state: Mutex<EngineState>,
    paused: AtomicBool,
    guardians: Option<Arc<GuardianRegistry>>,
    dispatcher: Option<ReleaseDispatcher>,
    events: Arc<EventLog>,
    clock: Arc<dyn Clock>,
}

impl WillEngine {
    pub fn new(events: Arc<EventLog>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(EngineState {
                next_will_id: 1,
                ..EngineState::default()
            }),
            paused: AtomicBool::new(false),
            guardians: None,
            dispatcher: None,
            events,
            clock,
        }
    }

    /// Enforce guardian eligibility and workload quotas through this
    /// registry at creation and release.
    pub fn with_guardian_registry(mut self, guardians: Arc<GuardianRegistry>) -> Self {
        self.guardians = Some(guardians);
        self
    }

    /// Dispatch asset distribution through this dispatcher on finalize.
    pub fn with_dispatcher(mut self, dispatcher: ReleaseDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    // ───────────────────────── lifecycle operations ─────────────────────────

    /// Create a will. The caller becomes the owner.
    pub fn create_will(&self, auth: &Auth, params: CreateWill) -> Result<u64, Error> {
        self.ensure_not_paused()?;
        let owner = auth.principal();
        validate_create(&owner, &params)?;

        // Reserve guardian slots first; undo on any failure so creation
        // never half-commits
        if let Some(registry) = &self.guardians {
            let manager = engine_auth();
            for (i, &guardian) in params.guardians.iter().enumerate() {
                if let Err(e) = registry.attach_to_will(&manager, guardian) {
                    for &attached in &params.guardians[..i] {
                        let _ = registry.detach_from_will(&manager, attached);
                    }
                    return Err(e);
                }
            }
        }

        let now = self.clock.now_secs();
        let mut state = self.lock();

        let id = state.next_will_id;
        state.next_will_id += 1;

        let guardian_index = params
            .guardians
            .iter()
            .enumerate()
            .map(|(i, &g)| (g, i as u8))
            .collect();

        let will = Will {
            id,
            owner,
            beneficiaries: params.beneficiaries.clone(),
            guardians: params.guardians,
            guardian_index,
            guardian_threshold: params.guardian_threshold,
            encrypted_cid: params.encrypted_cid,
            payload_hash: params.payload_hash,
            heartbeat_timeout: params.heartbeat_timeout,
            last_heartbeat: now,
            vault_address: params.vault_address,
            approvals_bitmap: 0,
            shares_bp: None,
            release_requested: false,
            release_request_ts: 0,
            released: false,
            created_at: now,
        };

        let guardian_count = will.guardians.len();
        state.wills.insert(id, will);
        state.pending.push(id);
        drop(state);

        log::info!("will {id} created by {owner} ({guardian_count} guardians)");
        self.events.append(
            now,
            Event::WillCreated {
                will_id: id,
                owner,
                guardian_count,
                beneficiary_count: params.beneficiaries.len(),
            },
        );
        Ok(id)
    }

    /// Owner proof of life: reset the liveness timer.
    ///
    /// Permitted while a release is merely requested — it does not cancel
    /// the request — but rejected once released.
    pub fn heartbeat(&self, auth: &Auth, will_id: u64) -> Result<(), Error> {
        self.ensure_not_paused()?;
        let now = self.clock.now_secs();

        let mut state = self.lock();
        let will = Self::will_mut(&mut state, will_id)?;
        if will.owner != auth.principal() {
            return Err(Error::NotOwner);
        }
        if will.released {
            return Err(Error::AlreadyReleased(will_id));
        }

        // Monotone: a lagging host clock must not move liveness backward
        will.last_heartbeat = will.last_heartbeat.max(now);
        drop(state);

        self.events.append(now, Event::Heartbeat { will_id });
        Ok(())
    }

    /// A guardian approves release. Idempotent: re-approval succeeds
    /// without state change. Crossing the quorum threshold transitions
    /// the will to RELEASE_REQUESTED — and that transition is sticky.
    pub fn guardian_approve(&self, auth: &Auth, will_id: u64) -> Result<(), Error> {
        self.ensure_not_paused()?;
        let now = self.clock.now_secs();
        let guardian = auth.principal();

        let mut state = self.lock();
        let will = Self::will_mut(&mut state, will_id)?;
        if will.released {
            return Err(Error::AlreadyReleased(will_id));
        }
        let bit = will.guardian_bit(&guardian).ok_or(Error::NotGuardian)?;

        let mask = 1u32 << bit;
        if will.approvals_bitmap & mask != 0 {
            return Ok(()); // already approved
        }

        will.approvals_bitmap |= mask;
        let approvals = will.approvals();
        let quorum_crossed = will.quorum_met() && !will.release_requested;
        if quorum_crossed {
            will.release_requested = true;
            will.release_request_ts = now;
        }
        drop(state);

        log::info!("guardian {guardian} approved will {will_id} ({approvals} approvals)");
        self.events.append(
            now,
            Event::GuardianApproved {
                will_id,
                guardian,
                approvals,
            },
        );
        if quorum_crossed {
            self.emit_release_requested(will_id, now);
        }
        Ok(())
    }

    /// The owner voluntarily starts the release timelock, regardless of
    /// approvals. Idempotent. Works while paused: it only moves the will
    /// toward release.
    pub fn request_release_by_owner(&self, auth: &Auth, will_id: u64) -> Result<(), Error> {
        let now = self.clock.now_secs();

        let mut state = self.lock();
        let will = Self::will_mut(&mut state, will_id)?;
        if will.owner != auth.principal() {
            return Err(Error::NotOwner);
        }
        if will.released {
            return Err(Error::AlreadyReleased(will_id));
        }
        if will.release_requested {
            return Ok(());
        }

        will.release_requested = true;
        will.release_request_ts = now;
        drop(state);

        log::info!("owner requested release of will {will_id}");
        self.emit_release_requested(will_id, now);
        Ok(())
    }

    /// Store explicit per-beneficiary basis points, overriding the
    /// default equal split. Owner only; rejected once released.
    pub fn set_beneficiary_shares(
        &self,
        auth: &Auth,
        will_id: u64,
        shares_bp: Vec<u16>,
    ) -> Result<(), Error> {
        let mut state = self.lock();
        let will = Self::will_mut(&mut state, will_id)?;
        if will.owner != auth.principal() {
            return Err(Error::NotOwner);
        }
        if will.released {
            return Err(Error::AlreadyReleased(will_id));
        }
        if shares_bp.len() != will.beneficiaries.len() {
            return Err(Error::invalid(format!(
                "{} shares for {} beneficiaries",
                shares_bp.len(),
                will.beneficiaries.len()
            )));
        }
        let total: u64 = shares_bp.iter().map(|&bp| bp as u64).sum();
        if total != 10_000 {
            return Err(Error::invalid(format!("shares sum to {total}, expected 10000")));
        }

        will.shares_bp = Some(shares_bp);
        Ok(())
    }

    /// Finalize a requested release once its timelock has expired.
    /// Scheduler role. Never blocked by the pause gate.
    pub fn finalize_release(&self, auth: &Auth, will_id: u64) -> Result<(), Error> {
        auth.require(Role::Scheduler)?;
        let now = self.clock.now_secs();

        let mut state = self.lock();
        let will = Self::will_mut(&mut state, will_id)?;
        if will.released {
            return Err(Error::AlreadyReleased(will_id));
        }
        if !will.release_requested {
            return Err(Error::NotRequested(will_id));
        }
        let releasable_at = will.release_request_ts.saturating_add(RELEASE_TIMELOCK);
        if now < releasable_at {
            return Err(Error::TimelockNotExpired { releasable_at, now });
        }

        will.released = true;
        let snapshot = will.clone();
        drop(state);

        log::info!("will {will_id} released");
        self.events.append(
            now,
            Event::ReleaseFinalized {
                will_id,
                beneficiaries: snapshot.beneficiaries.clone(),
            },
        );

        self.settle_guardians(&snapshot);
        self.dispatch_assets(&snapshot);
        Ok(())
    }

    // ───────────────────────── scheduler contract ─────────────────────────

    /// Pure predicate: would this will release if asked right now?
    pub fn is_eligible_for_release(&self, will_id: u64) -> Result<bool, Error> {
        let now = self.clock.now_secs();
        let state = self.lock();
        let will = state.wills.get(&will_id).ok_or(Error::WillNotFound(will_id))?;
        Ok(will.is_eligible_for_release(now))
    }

    /// Bounded scan of the pending-check ring: up to `batch_size` ids
    /// that are eligible and not yet released. Released wills found in
    /// the scanned window are pruned from the ring, so the queue does not
    /// revisit dead entries forever.
    pub fn scheduler_poll(&self, batch_size: usize) -> (bool, Vec<u64>) {
        if batch_size == 0 {
            return (false, Vec::new());
        }
        let now = self.clock.now_secs();
        let mut state = self.lock();

        let mut work = Vec::new();
        let mut offset = 0;
        let mut scanned = 0;
        while scanned < batch_size && !state.pending.is_empty() {
            let len = state.pending.len();
            let slot = (state.pending_cursor + offset) % len;
            let id = state.pending[slot];

            let released = state
                .wills
                .get(&id)
                .map(|w| w.released)
                .unwrap_or(true);
            if released {
                // O(1) prune; ring order is a fairness heuristic, not a
                // guarantee
                state.pending.swap_remove(slot);
                scanned += 1;
                continue;
            }

            if let Some(will) = state.wills.get(&id) {
                if will.is_eligible_for_release(now) {
                    work.push(id);
                }
            }
            offset += 1;
            scanned += 1;
        }

        let len = state.pending.len();
        if len > 0 {
            state.pending_cursor = (state.pending_cursor + batch_size) % len;
        } else {
            state.pending_cursor = 0;
        }

        (!work.is_empty(), work)
    }

    /// Move each eligible, not-yet-requested will in `work` into
    /// RELEASE_REQUESTED. Scheduler role. Returns how many transitioned.
    pub fn scheduler_perform(&self, auth: &Auth, work: &[u64]) -> Result<usize, Error> {
        auth.require(Role::Scheduler)?;
        let now = self.clock.now_secs();

        let mut transitioned = Vec::new();
        {
            let mut state = self.lock();
            for &will_id in work {
                let Some(will) = state.wills.get_mut(&will_id) else {
                    continue;
                };
                if will.released
                    || will.release_requested
                    || !will.is_eligible_for_release(now)
                {
                    continue;
                }
                will.release_requested = true;
                will.release_request_ts = now;
                transitioned.push(will_id);
            }
        }

        for &will_id in &transitioned {
            log::info!("scheduler requested release of will {will_id}");
            self.emit_release_requested(will_id, now);
        }
        Ok(transitioned.len())
    }

    // ───────────────────────── pause gate ─────────────────────────

    /// Admin: block new wills, heartbeats, and approvals. Finalization,
    /// owner release requests, and emergency withdrawal keep working —
    /// a paused system must not strand assets.
    pub fn pause(&self, auth: &Auth) -> Result<(), Error> {
        auth.require(Role::Admin)?;
        self.paused.store(true, Ordering::SeqCst);
        log::warn!("engine paused");
        Ok(())
    }

    pub fn unpause(&self, auth: &Auth) -> Result<(), Error> {
        auth.require(Role::Admin)?;
        self.paused.store(false, Ordering::SeqCst);
        log::info!("engine unpaused");
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    // ───────────────────────── reads ─────────────────────────

    /// Snapshot of one will.
    pub fn will(&self, will_id: u64) -> Result<Will, Error> {
        self.lock()
            .wills
            .get(&will_id)
            .cloned()
            .ok_or(Error::WillNotFound(will_id))
    }

    pub fn will_count(&self) -> usize {
        self.lock().wills.len()
    }

    /// Migration hook: a full snapshot of every will, for cross-host
    /// export. The multi-party authorization ceremony around an actual
    /// migration is the host's protocol; the engine only gates the read
    /// behind the root role.
    pub fn migration_snapshot(&self, auth: &Auth) -> Result<Vec<Will>, Error> {
        auth.require(Role::DefaultAdmin)?;
        let state = self.lock();
        let mut wills: Vec<Will> = state.wills.values().cloned().collect();
        wills.sort_unstable_by_key(|w| w.id);
        Ok(wills)
    }

    /// Ids currently in RELEASE_REQUESTED whose timelock has expired —
    /// the finalize sweep the scheduler runs each tick.
    pub fn finalizable_wills(&self) -> Vec<u64> {
        let now = self.clock.now_secs();
        let state = self.lock();
        let mut ids: Vec<u64> = state
            .wills
            .values()
            .filter(|w| {
                !w.released
                    && w.release_requested
                    && now >= w.release_request_ts.saturating_add(RELEASE_TIMELOCK)
            })
            .map(|w| w.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    // ───────────────────────── internals ─────────────────────────

    fn emit_release_requested(&self, will_id: u64, now: u64) {
        self.events.append(
            now,
            Event::ReleaseRequested {
                will_id,
                projected_release_ts: now.saturating_add(RELEASE_TIMELOCK),
            },
        );
    }

    /// Post-release guardian accounting: free every guardian's slot and
    /// credit the approvers.
    fn settle_guardians(&self, will: &Will) {
        let Some(registry) = &self.guardians else {
            return;
        };
        let manager = engine_auth();
        for &guardian in &will.guardians {
            if let Err(e) = registry.detach_from_will(&manager, guardian) {
                log::warn!("could not detach guardian {guardian}: {e}");
            }
        }
        if self.dispatcher.is_none() {
            // No dispatcher to credit approvers; do it here so
            // secrets-only deployments still build reputation
            for approver in will.approvers() {
                if let Err(e) = registry.record_successful_release(&manager, approver) {
                    log::warn!("could not credit guardian {approver}: {e}");
                }
            }
        }
    }

    /// Asset distribution, decoupled from the state machine: a failure
    /// here is logged and retried out of band; the will stays released.
    fn dispatch_assets(&self, will: &Will) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        if will.vault_address.is_none() {
            return;
        }

        let shares = will
            .shares_bp
            .clone()
            .unwrap_or_else(|| equal_shares(will.beneficiaries.len()));

        if let Err(e) =
            dispatcher.dispatch(will.id, &will.beneficiaries, &shares, &will.approvers())
        {
            log::error!("asset dispatch for will {} failed: {e}", will.id);
        }
    }

    fn ensure_not_paused(&self) -> Result<(), Error> {
        if self.is_paused() {
            Err(Error::Paused)
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().expect("engine state poisoned")
    }

    fn will_mut<'a>(
        state: &'a mut EngineState,
        will_id: u64,
    ) -> Result<&'a mut Will, Error> {
        state
            .wills
            .get_mut(&will_id)
            .ok_or(Error::WillNotFound(will_id))
    }
}

/// Creation validation, in the documented order.
fn validate_create(owner: &Principal, params: &CreateWill) -> Result<(), Error> {
    if owner.is_null() {
        return Err(Error::invalid("null owner"));
    }
    let g = params.guardians.len();
    if g == 0 || g > MAX_GUARDIANS {
        return Err(Error::invalid(format!(
            "guardian count {g} outside 1..={MAX_GUARDIANS}"
        )));
    }
    let b = params.beneficiaries.len();
    if b == 0 || b > MAX_BENEFICIARIES {
        return Err(Error::invalid(format!(
            "beneficiary count {b} outside 1..={MAX_BENEFICIARIES}"
        )));
    }
    let k = params.guardian_threshold as usize;
    if k == 0 || k > g {
        return Err(Error::invalid(format!("threshold {k} outside 1..={g}")));
    }
    if params.heartbeat_timeout < MIN_HEARTBEAT_TIMEOUT
        || params.heartbeat_timeout > MAX_HEARTBEAT_TIMEOUT
    {
        return Err(Error::invalid(format!(
            "heartbeat timeout {} outside {MIN_HEARTBEAT_TIMEOUT}..={MAX_HEARTBEAT_TIMEOUT}",
            params.heartbeat_timeout
        )));
    }
    if params.encrypted_cid.is_empty() {
        return Err(Error::invalid("empty encrypted CID"));
    }
    if params.payload_hash == [0u8; 32] {
        return Err(Error::invalid("zero payload hash"));
    }
    if params.guardians.iter().any(Principal::is_null) {
        return Err(Error::invalid("null guardian"));
    }
    if params.beneficiaries.iter().any(Principal::is_null) {
        return Err(Error::invalid("null beneficiary"));
    }
    let mut seen: HashSet<&Principal> = HashSet::with_capacity(g);
    for guardian in &params.guardians {
        if guardian == owner {
            return Err(Error::invalid("owner cannot be their own guardian"));
        }
        if !seen.insert(guardian) {
            return Err(Error::invalid("duplicate guardian"));
        }
    }
    let mut seen: HashSet<&Principal> = HashSet::with_capacity(b);
    for beneficiary in &params.beneficiaries {
        if !seen.insert(beneficiary) {
            return Err(Error::invalid("duplicate beneficiary"));
        }
    }
    Ok(())
}
