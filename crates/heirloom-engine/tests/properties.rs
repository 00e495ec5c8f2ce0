//! Property-based invariants over arbitrary operation sequences.
//!
//! A random interleaving of heartbeats, approvals, owner requests,
//! finalize attempts, and clock jumps must uphold the engine's universal
//! invariants: monotone approvals, monotone liveness, at-most-once
//! release, quorum stickiness, and the timelock gate.

use heirloom_core::{Auth, Clock, EventLog, ManualClock, Principal, RELEASE_TIMELOCK, Role};
use heirloom_engine::{CreateWill, WillEngine};
use proptest::prelude::*;
use std::sync::Arc;

const DAY: u64 = 86_400;
const START: u64 = 1_750_000_000;
const N_GUARDIANS: u8 = 4;

#[derive(Debug, Clone)]
enum Op {
    Advance(u64),
    Heartbeat,
    Approve(u8),
    OwnerRequest,
    Finalize,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1u64..20 * DAY).prop_map(Op::Advance),
        Just(Op::Heartbeat),
        (0u8..N_GUARDIANS).prop_map(Op::Approve),
        Just(Op::OwnerRequest),
        Just(Op::Finalize),
    ]
}

struct Observed {
    bitmap: u32,
    last_heartbeat: u64,
    release_requested: bool,
    release_request_ts: u64,
    released: bool,
    released_at: Option<u64>,
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_state_machine_invariants(
        threshold in 1u8..=N_GUARDIANS,
        ops in proptest::collection::vec(op_strategy(), 1..80),
    ) {
        let clock = Arc::new(ManualClock::new(START));
        let engine = WillEngine::new(Arc::new(EventLog::new()), clock.clone());

        let owner = Auth::caller(Principal::from_label(100));
        let scheduler = Auth::caller(Principal::from_label(90)).with_role(Role::Scheduler);
        let will_id = engine
            .create_will(&owner, CreateWill {
                guardians: (1..=N_GUARDIANS).map(Principal::from_label).collect(),
                guardian_threshold: threshold,
                encrypted_cid: "bafy-prop".into(),
                payload_hash: [7; 32],
                heartbeat_timeout: 7 * DAY,
                beneficiaries: vec![Principal::from_label(200)],
                vault_address: None,
            })
            .unwrap();

        let snapshot = |at: Option<u64>| {
            let w = engine.will(will_id).unwrap();
            Observed {
                bitmap: w.approvals_bitmap,
                last_heartbeat: w.last_heartbeat,
                release_requested: w.release_requested,
                release_request_ts: w.release_request_ts,
                released: w.released,
                released_at: at,
            }
        };

        let mut prev = snapshot(None);

        for op in ops {
            let mut released_now = None;
            match op {
                Op::Advance(secs) => clock.advance(secs),
                Op::Heartbeat => {
                    let _ = engine.heartbeat(&owner, will_id);
                }
                Op::Approve(i) => {
                    let _ = engine
                        .guardian_approve(&Auth::caller(Principal::from_label(i + 1)), will_id);
                }
                Op::OwnerRequest => {
                    let _ = engine.request_release_by_owner(&owner, will_id);
                }
                Op::Finalize => {
                    if engine.finalize_release(&scheduler, will_id).is_ok() {
                        released_now = Some(clock.now_secs());
                    }
                }
            }

            let cur = snapshot(released_now.or(prev.released_at));

            // Invariant 1: approval bits only ever go 0→1
            prop_assert_eq!(
                cur.bitmap & prev.bitmap,
                prev.bitmap,
                "an approval bit was cleared"
            );

            // Invariant 2: liveness is monotone
            prop_assert!(cur.last_heartbeat >= prev.last_heartbeat);

            // Invariant: released ⇒ release_requested, with a real timestamp
            if cur.released {
                prop_assert!(cur.release_requested);
            }
            if cur.release_requested {
                prop_assert!(cur.release_request_ts > 0);
            }

            // Invariant 3: release is terminal; nothing mutates after
            if prev.released {
                prop_assert_eq!(cur.bitmap, prev.bitmap);
                prop_assert_eq!(cur.last_heartbeat, prev.last_heartbeat);
                prop_assert_eq!(cur.release_request_ts, prev.release_request_ts);
                prop_assert!(cur.released);
            }

            // Invariant 4: quorum stickiness — once popcount ≥ k, the
            // will is (and stays) requested
            if cur.bitmap.count_ones() >= threshold as u32 {
                prop_assert!(cur.release_requested, "quorum met but not requested");
            }
            if prev.release_requested {
                prop_assert!(cur.release_requested, "release request was cancelled");
                prop_assert_eq!(cur.release_request_ts, prev.release_request_ts);
            }

            // Invariant 5: the timelock gate held at finalize time
            if let Some(at) = released_now {
                prop_assert!(at >= cur.release_request_ts + RELEASE_TIMELOCK);
            }

            prev = cur;
        }
    }

    /// Guardian quota bookkeeping: attach strictly increments,
    /// detach saturates at zero.
    #[test]
    fn prop_guardian_quota(attaches in 0u32..8, extra_detaches in 0u32..8) {
        use heirloom_guardians::{GuardianLimits, GuardianRegistry};

        let registry = GuardianRegistry::new(
            GuardianLimits { min_reputation: 0, max_wills_per_guardian: u32::MAX },
            Arc::new(EventLog::new()),
            Arc::new(ManualClock::new(START)),
        );
        let admin = Auth::caller(Principal::from_label(91)).with_role(Role::Admin);
        let manager = Auth::caller(Principal::from_label(90)).with_role(Role::WillManager);

        let g = Principal::from_label(1);
        registry
            .register(&Auth::caller(g), "uri".into(), [1; 32], [0; 32])
            .unwrap();
        registry.verify(&admin, g, true).unwrap();

        for n in 0..attaches {
            prop_assert_eq!(registry.profile(&g).unwrap().total_wills, n);
            registry.attach_to_will(&manager, g).unwrap();
        }
        for _ in 0..(attaches + extra_detaches) {
            registry.detach_from_will(&manager, g).unwrap();
        }
        prop_assert_eq!(registry.profile(&g).unwrap().total_wills, 0);
    }
}
