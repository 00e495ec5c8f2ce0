//! End-to-end integration test for the full will lifecycle.
//!
//! Proves that the engine, guardian registry, vault, and dispatcher
//! compose correctly:
//!
//! 1. Guardians register and get verified
//! 2. Owner creates a will (guardian slots reserved) and funds the vault
//! 3. Owner goes silent; guardians reach quorum after the timer expires
//! 4. The timelock passes and the scheduler finalizes
//! 5. Assets distribute by basis points; approvers earn reputation

use heirloom_core::{
    Auth, Error, Event, EventLog, ManualClock, Principal, Role, RELEASE_TIMELOCK,
};
use heirloom_engine::{CreateWill, ReleaseDispatcher, WillEngine};
use heirloom_guardians::{GuardianLimits, GuardianRegistry};
use heirloom_vault::{AssetVault, LedgerTransfer, TokenId};
use std::sync::Arc;

const DAY: u64 = 86_400;
const START: u64 = 1_750_000_000;

struct World {
    engine: WillEngine,
    vault: Arc<AssetVault>,
    guardians: Arc<GuardianRegistry>,
    ledger: Arc<LedgerTransfer>,
    events: Arc<EventLog>,
    clock: Arc<ManualClock>,
}

fn world() -> World {
    let clock = Arc::new(ManualClock::new(START));
    let events = Arc::new(EventLog::new());
    let ledger = Arc::new(LedgerTransfer::new());

    let guardians = Arc::new(GuardianRegistry::new(
        GuardianLimits::default(),
        events.clone(),
        clock.clone(),
    ));
    let vault = Arc::new(AssetVault::new(
        ledger.clone(),
        events.clone(),
        clock.clone(),
    ));
    let dispatcher =
        ReleaseDispatcher::new(vault.clone()).with_guardian_registry(guardians.clone());
    let engine = WillEngine::new(events.clone(), clock.clone())
        .with_guardian_registry(guardians.clone())
        .with_dispatcher(dispatcher);

    World {
        engine,
        vault,
        guardians,
        ledger,
        events,
        clock,
    }
}

fn admin() -> Auth {
    Auth::caller(Principal::from_label(91)).with_role(Role::Admin)
}

fn scheduler() -> Auth {
    Auth::caller(Principal::from_label(90)).with_role(Role::Scheduler)
}

/// Register and verify guardians G1..Gn.
fn seed_guardians(w: &World, n: u8) -> Vec<Principal> {
    (1..=n)
        .map(|i| {
            let g = Principal::from_label(i);
            w.guardians
                .register(&Auth::caller(g), format!("ipfs://guardian-{i}"), [i; 32], [0; 32])
                .unwrap();
            w.guardians.verify(&admin(), g, true).unwrap();
            g
        })
        .collect()
}

fn will_params(guardians: &[Principal], threshold: u8, beneficiaries: Vec<Principal>) -> CreateWill {
    CreateWill {
        guardians: guardians.to_vec(),
        guardian_threshold: threshold,
        encrypted_cid: "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi".into(),
        payload_hash: [0x51; 32],
        heartbeat_timeout: 7 * DAY,
        beneficiaries,
        vault_address: Some("vault:primary".into()),
    }
}

#[test]
fn test_full_inheritance_lifecycle() {
    // Scenario E1: k=2, n=3, heartbeat timeout 7 days
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));
    let heir = Principal::from_label(200);

    // ── Step 1: create the will ──
    let will_id = w
        .engine
        .create_will(&owner, will_params(&guardians, 2, vec![heir]))
        .unwrap();
    assert_eq!(will_id, 1);
    for &g in &guardians {
        assert_eq!(w.guardians.profile(&g).unwrap().total_wills, 1);
    }

    // ── Step 2: fund the vault ──
    w.vault.deposit_native(&owner, will_id, 1_000_000).unwrap();

    // ── Step 3: owner goes silent past the timeout ──
    w.clock.advance(7 * DAY + 1);
    assert!(!w.engine.is_eligible_for_release(will_id).unwrap());

    w.engine
        .guardian_approve(&Auth::caller(guardians[0]), will_id)
        .unwrap();
    assert_eq!(w.engine.will(will_id).unwrap().approvals_bitmap, 0b001);
    assert!(!w.engine.will(will_id).unwrap().release_requested);

    w.engine
        .guardian_approve(&Auth::caller(guardians[1]), will_id)
        .unwrap();
    let will = w.engine.will(will_id).unwrap();
    assert_eq!(will.approvals_bitmap, 0b011);
    assert!(will.release_requested);
    let request_ts = will.release_request_ts;
    assert_eq!(request_ts, START + 7 * DAY + 1);
    assert!(w.engine.is_eligible_for_release(will_id).unwrap());

    // ── Step 4: the timelock passes; scheduler finalizes ──
    w.clock.advance(7 * DAY + 1);
    assert_eq!(w.engine.finalizable_wills(), vec![will_id]);
    w.engine.finalize_release(&scheduler(), will_id).unwrap();

    let will = w.engine.will(will_id).unwrap();
    assert!(will.released);

    let finalized = w
        .events
        .tail(0)
        .into_iter()
        .find(|r| matches!(r.event, Event::ReleaseFinalized { .. }))
        .expect("ReleaseFinalized emitted");
    assert_eq!(
        finalized.event,
        Event::ReleaseFinalized {
            will_id,
            beneficiaries: vec![heir],
        }
    );

    // ── Step 5: assets distributed, guardians settled ──
    assert_eq!(w.ledger.native_balance(heir), 1_000_000);
    assert_eq!(w.vault.will_native_balance(will_id), 0);

    for &g in &guardians {
        assert_eq!(w.guardians.profile(&g).unwrap().total_wills, 0);
    }
    // The two approvers earned reputation; the third did not
    assert_eq!(w.guardians.profile(&guardians[0]).unwrap().reputation, 110);
    assert_eq!(w.guardians.profile(&guardians[1]).unwrap().reputation, 110);
    assert_eq!(w.guardians.profile(&guardians[2]).unwrap().reputation, 100);
    assert_eq!(
        w.guardians.profile(&guardians[0]).unwrap().successful_releases,
        1
    );
}

#[test]
fn test_premature_finalize_rejected_with_state_intact() {
    // Scenario E2
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));

    let will_id = w
        .engine
        .create_will(
            &owner,
            will_params(&guardians, 2, vec![Principal::from_label(200)]),
        )
        .unwrap();

    w.clock.advance(7 * DAY + 1);
    w.engine
        .guardian_approve(&Auth::caller(guardians[0]), will_id)
        .unwrap();
    w.engine
        .guardian_approve(&Auth::caller(guardians[1]), will_id)
        .unwrap();

    let result = w.engine.finalize_release(&scheduler(), will_id);
    assert!(matches!(result, Err(Error::TimelockNotExpired { .. })));

    let will = w.engine.will(will_id).unwrap();
    assert!(will.release_requested);
    assert!(!will.released);
}

#[test]
fn test_owner_override_releases_without_approvals() {
    // Scenario E4
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));
    let heir = Principal::from_label(200);

    let will_id = w
        .engine
        .create_will(&owner, will_params(&guardians, 2, vec![heir]))
        .unwrap();
    w.vault.deposit_native(&owner, will_id, 5_000).unwrap();

    w.engine.request_release_by_owner(&owner, will_id).unwrap();
    assert!(w.engine.will(will_id).unwrap().release_requested);
    assert_eq!(w.engine.will(will_id).unwrap().approvals_bitmap, 0);

    w.clock.advance(RELEASE_TIMELOCK + 1);
    w.engine.finalize_release(&scheduler(), will_id).unwrap();

    assert!(w.engine.will(will_id).unwrap().released);
    assert_eq!(w.ledger.native_balance(heir), 5_000);
}

#[test]
fn test_emergency_withdraw_then_release_skips_record() {
    // Scenario E5: withdraw before any release
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));
    let heir = Principal::from_label(200);

    let will_id = w
        .engine
        .create_will(&owner, will_params(&guardians, 2, vec![heir]))
        .unwrap();
    w.vault
        .deposit_native(&owner, will_id, 1_000_000_000_000_000_000)
        .unwrap();

    w.vault.emergency_withdraw(&owner, will_id, 0).unwrap();
    assert_eq!(
        w.ledger.native_balance(owner.principal()),
        1_000_000_000_000_000_000
    );
    assert!(w.vault.deposits(will_id)[0].released);

    // Release still finalizes; the withdrawn record is skipped
    w.engine.request_release_by_owner(&owner, will_id).unwrap();
    w.clock.advance(RELEASE_TIMELOCK + 1);
    w.engine.finalize_release(&scheduler(), will_id).unwrap();
    assert_eq!(w.ledger.native_balance(heir), 0);
}

#[test]
fn test_explicit_shares_drive_distribution() {
    // Scenario E6 driven through the engine
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));
    let b1 = Principal::from_label(200);
    let b2 = Principal::from_label(201);

    let will_id = w
        .engine
        .create_will(&owner, will_params(&guardians, 2, vec![b1, b2]))
        .unwrap();
    let token = TokenId("usdq".into());
    w.vault
        .deposit_fungible(&owner, will_id, token.clone(), 1_000_001)
        .unwrap();

    w.engine
        .set_beneficiary_shares(&owner, will_id, vec![3_333, 6_667])
        .unwrap();

    w.engine.request_release_by_owner(&owner, will_id).unwrap();
    w.clock.advance(RELEASE_TIMELOCK + 1);
    w.engine.finalize_release(&scheduler(), will_id).unwrap();

    assert_eq!(w.ledger.fungible_balance(&token, b1), 333_333);
    assert_eq!(w.ledger.fungible_balance(&token, b2), 667_003);
    // 665 units of dust remain unspent
}

#[test]
fn test_equal_split_default_with_remainder_to_first() {
    let w = world();
    let guardians = seed_guardians(&w, 2);
    let owner = Auth::caller(Principal::from_label(100));
    let heirs: Vec<Principal> = (200..203).map(|i| Principal::from_label(i as u8)).collect();

    let will_id = w
        .engine
        .create_will(&owner, will_params(&guardians, 1, heirs.clone()))
        .unwrap();
    w.vault.deposit_native(&owner, will_id, 30_000).unwrap();

    w.engine.request_release_by_owner(&owner, will_id).unwrap();
    w.clock.advance(RELEASE_TIMELOCK + 1);
    w.engine.finalize_release(&scheduler(), will_id).unwrap();

    // 3334 / 3333 / 3333 bp of 30_000
    assert_eq!(w.ledger.native_balance(heirs[0]), 10_002);
    assert_eq!(w.ledger.native_balance(heirs[1]), 9_999);
    assert_eq!(w.ledger.native_balance(heirs[2]), 9_999);
}

#[test]
fn test_unverified_guardian_blocks_creation() {
    let w = world();
    let g = Principal::from_label(1);
    w.guardians
        .register(&Auth::caller(g), "uri".into(), [1; 32], [0; 32])
        .unwrap();
    // Never verified

    let owner = Auth::caller(Principal::from_label(100));
    let result = w.engine.create_will(
        &owner,
        will_params(&[g], 1, vec![Principal::from_label(200)]),
    );
    assert!(matches!(result, Err(Error::InvalidParameters(_))));
    assert_eq!(w.engine.will_count(), 0);
    // The failed creation left no slot reserved
    assert_eq!(w.guardians.profile(&g).unwrap().total_wills, 0);
}

#[test]
fn test_scheduler_tick_drives_request_and_finalize() {
    // The daemon's per-tick contract: poll, perform, finalize sweep
    let w = world();
    let guardians = seed_guardians(&w, 3);
    let owner = Auth::caller(Principal::from_label(100));

    let will_id = w
        .engine
        .create_will(
            &owner,
            will_params(&guardians, 2, vec![Principal::from_label(200)]),
        )
        .unwrap();

    // Tick 1: nothing eligible
    let (needs_work, work) = w.engine.scheduler_poll(10);
    assert!(!needs_work && work.is_empty());
    assert!(w.engine.finalizable_wills().is_empty());

    // Quorum after expiry
    w.clock.advance(7 * DAY + 1);
    w.engine
        .guardian_approve(&Auth::caller(guardians[0]), will_id)
        .unwrap();
    w.engine
        .guardian_approve(&Auth::caller(guardians[1]), will_id)
        .unwrap();

    // Tick 2: requested but timelocked
    let (_, work) = w.engine.scheduler_poll(10);
    w.engine.scheduler_perform(&scheduler(), &work).unwrap();
    assert!(w.engine.finalizable_wills().is_empty());

    // Tick 3: past the timelock, the sweep finalizes
    w.clock.advance(RELEASE_TIMELOCK + 1);
    for id in w.engine.finalizable_wills() {
        w.engine.finalize_release(&scheduler(), id).unwrap();
    }
    assert!(w.engine.will(will_id).unwrap().released);
}
